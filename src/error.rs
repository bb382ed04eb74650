use std::path::PathBuf;
use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::flat::FlatIndexError;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Index {index} is out of bounds for {store} of size {len}")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        store: &'static str,
    },

    #[error("RAG state for document {document_id} not found at {}", .path.display())]
    NotFound { document_id: String, path: PathBuf },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl From<FlatIndexError> for RagError {
    fn from(e: FlatIndexError) -> Self {
        match e {
            FlatIndexError::DimensionMismatch { expected, got } => {
                RagError::DimensionMismatch { expected, got }
            }
            FlatIndexError::OutOfRange { ordinal, count } => RagError::IndexOutOfRange {
                index: ordinal,
                len: count,
                store: "vector index",
            },
            FlatIndexError::Serialization(msg) => RagError::Persistence(msg),
        }
    }
}

pub type RagResult<T> = Result<T, RagError>;
