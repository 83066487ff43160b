pub mod embeddings;
pub mod memory;
pub mod pipeline;
pub mod vector_index;

pub use embeddings::{Embedder, RemoteEmbedder};
pub use memory::ConversationMemory;
pub use pipeline::{BuildStats, ChatOutcome, RagPipeline};
pub use vector_index::{SearchHit, VectorIndex};
