use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod agent;
pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod http;
pub mod indexer;
pub mod llm;
pub mod retrieval;
