use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::models::{EmbeddingsRequest, EmbeddingsResponse};

/// How many texts go into one embeddings request.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Maps text to fixed-length vectors. The pipeline only depends on this
/// trait, so tests can run against a deterministic local implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.embed(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embeddings response was empty"))
    }
}

/// Remote embedder against an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl RemoteEmbedder {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_base,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.api_base);
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let request = EmbeddingsRequest {
                model: self.model.clone(),
                input: batch.to_vec(),
            };

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                anyhow::bail!("Embeddings request failed: {} - {}", status, error_text);
            }

            let mut parsed: EmbeddingsResponse = response.json().await?;
            if parsed.data.len() != batch.len() {
                anyhow::bail!(
                    "Embeddings response had {} rows for {} inputs",
                    parsed.data.len(),
                    batch.len()
                );
            }
            // The API documents row order; sort by index rather than rely on it.
            parsed.data.sort_by_key(|row| row.index);
            vectors.extend(parsed.data.into_iter().map(|row| row.embedding));
        }

        Ok(vectors)
    }
}
