pub mod config;
pub mod files;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod rag;
