use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Chat API

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// History as rendered by the UI. The server-side conversation memory
    /// is authoritative; this field is accepted for interface compatibility.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

// OpenAI-compatible wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsResponse {
    pub data: Vec<EmbeddingRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingRow {
    pub index: usize,
    pub embedding: Vec<f32>,
}

// File management

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub format: String,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub total_files: usize,
    pub failed_files: Vec<String>,
    pub total_chunks: usize,
    pub index_entries: usize,
    pub memory_turns: usize,
    pub built_at: DateTime<Utc>,
    pub upload_dir: String,
}
