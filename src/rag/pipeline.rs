use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::ingest::{chunk_documents, load_documents};
use crate::llm::CompletionModel;
use crate::models::{ChatMessage, ChatTurn};

use super::embeddings::Embedder;
use super::memory::ConversationMemory;
use super::vector_index::{SearchHit, VectorIndex};

#[derive(Debug, Clone)]
pub struct BuildStats {
    pub total_files: usize,
    pub failed_files: Vec<String>,
    pub total_chunks: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    pub sources: Vec<String>,
}

/// One built pipeline: a vector index over the current folder contents plus
/// a fresh conversation memory. Instances are immutable apart from the
/// memory; any change to the folder produces a replacement instance.
pub struct RagPipeline {
    index: VectorIndex,
    memory: Mutex<ConversationMemory>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn CompletionModel>,
    top_k: usize,
    stats: BuildStats,
}

impl RagPipeline {
    /// Load, chunk, embed, and index everything under `root`. Per-file
    /// extraction failures are recorded and skipped; an embedding failure
    /// aborts the whole build.
    pub async fn build(
        root: &Path,
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn CompletionModel>,
    ) -> Result<Self> {
        let outcome = load_documents(root, settings.plain_text_files);
        let chunks = chunk_documents(&outcome.documents, settings.chunk_size, settings.chunk_overlap);

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;

        let stats = BuildStats {
            total_files: outcome.documents.len(),
            failed_files: outcome.failed_files,
            total_chunks: chunks.len(),
            built_at: Utc::now(),
        };
        let index = VectorIndex::build(chunks, embeddings)?;

        tracing::info!(
            "Pipeline built from {}: {} files, {} chunks, {} failed",
            root.display(),
            stats.total_files,
            stats.total_chunks,
            stats.failed_files.len()
        );

        Ok(Self {
            index,
            memory: Mutex::new(ConversationMemory::default()),
            embedder,
            llm,
            top_k: settings.top_k,
            stats,
        })
    }

    /// One conversational retrieval turn: embed the question, pull top-k
    /// chunks, forward history plus context to the model, record the turn.
    pub async fn answer(&self, question: &str) -> Result<ChatOutcome> {
        let hits = if self.index.is_empty() {
            Vec::new()
        } else {
            let query = self.embedder.embed_one(question).await?;
            self.index.search(&query, self.top_k)
        };

        let history = self.memory.lock().await.render().to_vec();
        let messages = assemble_messages(&history, &hits, question);
        let sources = hit_sources(&hits);

        let answer = self.llm.complete(messages).await?;

        self.memory
            .lock()
            .await
            .append(question.to_string(), answer.clone());

        Ok(ChatOutcome { answer, sources })
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }
}

/// History turns as alternating user/assistant messages, then the question
/// with retrieved excerpts (each tagged with its source path) prepended.
pub fn assemble_messages(
    history: &[ChatTurn],
    hits: &[SearchHit<'_>],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new(
        "system",
        "You answer questions about the user's documents. \
         Ground your answers in the provided excerpts when they are relevant.",
    )];

    for turn in history {
        messages.push(ChatMessage::new("user", turn.question.clone()));
        messages.push(ChatMessage::new("assistant", turn.answer.clone()));
    }

    if hits.is_empty() {
        messages.push(ChatMessage::new("user", question));
    } else {
        let mut content = String::from("Relevant excerpts:\n");
        for hit in hits {
            content.push_str(&format!(
                "\n[{}]\n{}\n",
                hit.chunk.source.display(),
                hit.chunk.text
            ));
        }
        content.push_str(&format!("\nQuestion: {}", question));
        messages.push(ChatMessage::new("user", content));
    }

    messages
}

/// Source paths of the hits, deduplicated, best hit first.
fn hit_sources(hits: &[SearchHit<'_>]) -> Vec<String> {
    let mut sources = Vec::new();
    for hit in hits {
        let source = hit.chunk.source.display().to_string();
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::PathBuf;

    use crate::ingest::Chunk;

    /// Deterministic character-trigram hashing embedder, so retrieval
    /// tests run without the remote API.
    struct HashEmbedder;

    impl HashEmbedder {
        fn vector(text: &str) -> Vec<f32> {
            let mut vector = vec![0f32; 64];
            let lowered = text.to_lowercase();
            let chars: Vec<char> = lowered.chars().collect();
            for window in chars.windows(3) {
                let token: String = window.iter().collect();
                let mut hash = 1469598103934665603u64;
                for byte in token.bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
                vector[(hash % 64) as usize] += 1.0;
            }
            vector
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }
    }

    /// Canned model that records nothing and answers with a fixed string.
    struct StubModel;

    #[async_trait]
    impl CompletionModel for StubModel {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String> {
            Ok("stub answer".to_string())
        }
    }

    fn test_settings(upload_dir: &Path) -> Settings {
        Settings {
            api_key: "sk-test".to_string(),
            api_base: "http://localhost".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            upload_dir: upload_dir.to_path_buf(),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            temperature: 0.7,
            plain_text_files: true,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    async fn build_pipeline(root: &Path) -> RagPipeline {
        RagPipeline::build(
            root,
            &test_settings(root),
            Arc::new(HashEmbedder),
            Arc::new(StubModel),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn empty_folder_builds_and_answers() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_pipeline(dir.path()).await;

        assert_eq!(pipeline.index_len(), 0);

        let outcome = pipeline.answer("anything there?").await.unwrap();
        assert_eq!(outcome.answer, "stub answer");
        assert!(outcome.sources.is_empty());
        assert_eq!(pipeline.memory_len().await, 1);
    }

    #[tokio::test]
    async fn rebuild_makes_new_file_retrievable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("animals.txt"),
            "capuchin monkeys forage in the canopy",
        )
        .unwrap();

        let pipeline = build_pipeline(dir.path()).await;
        assert_eq!(pipeline.index_len(), 1);

        // New file appears only after a rebuild.
        std::fs::write(
            dir.path().join("oceans.txt"),
            "tidal currents shape coastal erosion patterns",
        )
        .unwrap();
        let outcome = pipeline
            .answer("what shapes tidal currents and coastal erosion?")
            .await
            .unwrap();
        assert!(!outcome.sources.iter().any(|s| s.ends_with("oceans.txt")));

        let rebuilt = build_pipeline(dir.path()).await;
        assert_eq!(rebuilt.index_len(), 2);
        let outcome = rebuilt
            .answer("what shapes tidal currents and coastal erosion?")
            .await
            .unwrap();
        assert_eq!(outcome.sources[0], dir.path().join("oceans.txt").display().to_string());
    }

    #[tokio::test]
    async fn delete_and_rebuild_removes_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let doomed = dir.path().join("doomed.txt");
        std::fs::write(&doomed, "ephemeral content about glaciers").unwrap();
        std::fs::write(dir.path().join("kept.txt"), "permanent notes on volcanoes").unwrap();

        let pipeline = build_pipeline(dir.path()).await;
        assert_eq!(pipeline.index_len(), 2);

        std::fs::remove_file(&doomed).unwrap();
        let rebuilt = build_pipeline(dir.path()).await;
        assert_eq!(rebuilt.index_len(), 1);

        let outcome = rebuilt
            .answer("tell me about ephemeral glaciers")
            .await
            .unwrap();
        assert!(!outcome.sources.iter().any(|s| s.ends_with("doomed.txt")));
    }

    #[tokio::test]
    async fn rebuild_starts_with_empty_memory() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_pipeline(dir.path()).await;
        pipeline.answer("first question").await.unwrap();
        pipeline.answer("second question").await.unwrap();
        assert_eq!(pipeline.memory_len().await, 2);

        let rebuilt = build_pipeline(dir.path()).await;
        assert_eq!(rebuilt.memory_len().await, 0);
    }

    #[tokio::test]
    async fn broken_file_is_recorded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fine.txt"), "all good here").unwrap();
        std::fs::write(dir.path().join("broken.docx"), "not a real docx").unwrap();

        let pipeline = build_pipeline(dir.path()).await;
        assert_eq!(pipeline.stats().total_files, 1);
        assert_eq!(pipeline.stats().failed_files, vec!["broken.docx".to_string()]);
    }

    #[test]
    fn messages_carry_history_context_and_question() {
        let history = vec![ChatTurn {
            question: "earlier question".to_string(),
            answer: "earlier answer".to_string(),
        }];
        let chunk = Chunk {
            text: "excerpt body".to_string(),
            source: PathBuf::from("uploads/doc.pdf"),
            doc_type: "pdf".to_string(),
            chunk_index: 0,
        };
        let hits = vec![SearchHit {
            chunk: &chunk,
            score: 0.9,
        }];

        let messages = assemble_messages(&history, &hits, "current question");
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].content, "earlier answer");

        let last = messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert!(last.content.contains("[uploads/doc.pdf]"));
        assert!(last.content.contains("excerpt body"));
        assert!(last.content.ends_with("Question: current question"));
    }

    #[test]
    fn sources_are_deduplicated_in_hit_order() {
        let chunk_a = Chunk {
            text: "a".to_string(),
            source: PathBuf::from("a.txt"),
            doc_type: "text".to_string(),
            chunk_index: 0,
        };
        let chunk_a2 = Chunk {
            text: "a again".to_string(),
            source: PathBuf::from("a.txt"),
            doc_type: "text".to_string(),
            chunk_index: 1,
        };
        let chunk_b = Chunk {
            text: "b".to_string(),
            source: PathBuf::from("b.txt"),
            doc_type: "text".to_string(),
            chunk_index: 0,
        };
        let hits: Vec<SearchHit<'_>> = [&chunk_a, &chunk_a2, &chunk_b]
            .into_iter()
            .map(|chunk| SearchHit { chunk, score: 1.0 })
            .collect();

        assert_eq!(hit_sources(&hits), vec!["a.txt".to_string(), "b.txt".to_string()]);
    }
}
