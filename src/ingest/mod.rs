pub mod chunker;
pub mod extractor;
pub mod walker;

use std::path::{Path, PathBuf};

use thiserror::Error;

use self::chunker::chunk_text;
use self::extractor::extract_text;
use self::walker::walk_directory;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Plain text extracted from one file, plus its provenance.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub source: PathBuf,
    pub doc_type: String,
}

/// A window of a document's text, the unit of embedding and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub source: PathBuf,
    pub doc_type: String,
    pub chunk_index: usize,
}

#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub failed_files: Vec<String>,
}

/// Walk `root` and extract every supported file. A failing file is logged
/// and recorded, and the rest of the load proceeds; a missing or empty
/// folder is not an error.
pub fn load_documents(root: &Path, plain_text: bool) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for (path, format) in walk_directory(root, plain_text) {
        match extract_text(&path, format) {
            Ok(text) => outcome.documents.push(Document {
                text,
                doc_type: format.label().to_string(),
                source: path,
            }),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                outcome.failed_files.push(
                    path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string()),
                );
            }
        }
    }

    outcome
}

/// Chunk every document, copying its provenance onto each chunk.
pub fn chunk_documents(documents: &[Document], window: usize, overlap: usize) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| {
            chunk_text(&doc.text, window, overlap)
                .into_iter()
                .map(|chunk| Chunk {
                    text: chunk.text,
                    source: doc.source.clone(),
                    doc_type: doc.doc_type.clone(),
                    chunk_index: chunk.chunk_index,
                })
        })
        .collect()
}
