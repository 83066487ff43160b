use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::models::{ChatMessage, CompletionRequest, CompletionResponse};

/// Produces an answer from an assembled message list. The pipeline depends
/// on this trait rather than on the HTTP client directly.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;
}

/// Client for an OpenAI-compatible chat-completions endpoint. Model and
/// temperature are fixed per instance.
pub struct ChatClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(api_base: String, api_key: String, model: String, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_base,
            api_key,
            model,
            temperature,
        }
    }
}

#[async_trait]
impl CompletionModel for ChatClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
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
            anyhow::bail!("Chat completion failed: {} - {}", status, error_text);
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completion returned no choices"))
    }
}
