// Embeddings module
// Markdown chunking and the remote embedding client

pub mod chunking;
pub mod gemini;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{
    ChunkingConfig, ContentChunk, chunk_markdown, estimate_token_count, reconstruct,
};
pub use gemini::{GeminiEmbedder, TaskType};

/// Turns text into fixed-dimension vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single string
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of strings, returning one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The vector dimension this embedder is expected to produce, if known
    fn dimension(&self) -> Option<usize>;
}
