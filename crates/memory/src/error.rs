use thiserror::Error;

use moneta_common::MonetaError;

use crate::embedding::EmbeddingError;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("no episode with id {0} in the catalog")]
    NotFound(u64),

    #[error("invalid episode state: {0}")]
    InvalidState(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("corrupt memory data: {0}")]
    Corrupt(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl From<MemoryError> for MonetaError {
    fn from(err: MemoryError) -> Self {
        MonetaError::Memory(err.to_string())
    }
}
