use std::cmp::Ordering;

use anyhow::Result;

use crate::ingest::Chunk;

/// One indexed chunk with its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub embedding: Vec<f32>,
    pub chunk: Chunk,
}

#[derive(Debug, Clone)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// In-memory vector index. Built in full from one ingestion pass; there is
/// no incremental insert or delete, and nothing survives a restart.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            );
        }
        let entries = embeddings
            .into_iter()
            .zip(chunks)
            .map(|(embedding, chunk)| IndexEntry { embedding, chunk })
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` chunks most cosine-similar to `query`, best first. Ties keep
    /// insertion order. An empty index returns no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit<'_>> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| SearchHit {
                chunk: &self.entries[i].chunk,
                score,
            })
            .collect()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
