// Embeddings module
// Fixed-window chunking and the Ollama embedding backend client

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, chunk_text};
pub use ollama::{EmbeddingProvider, OllamaEmbedder};
