use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Runtime settings, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub api_base: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub upload_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub temperature: f32,
    pub plain_text_files: bool,
    pub bind_addr: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let settings = Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY must be set")?,
            api_base: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            chat_model: env_or("CHAT_MODEL", "gpt-4o-mini"),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            chunk_size: env_parse("CHUNK_SIZE", 1000)?,
            chunk_overlap: env_parse("CHUNK_OVERLAP", 200)?,
            top_k: env_parse("TOP_K", 4)?,
            temperature: env_parse("TEMPERATURE", 0.7)?,
            plain_text_files: env_parse("PLAIN_TEXT_FILES", true)?,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("CHUNK_SIZE must be greater than zero");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 {
            anyhow::bail!("TOP_K must be greater than zero");
        }
        Ok(())
    }
}
