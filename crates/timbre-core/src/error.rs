use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A vector does not match the dimensionality established by the store.
    #[error("schema violation: expected embedding of length {expected}, got {actual}")]
    SchemaViolation { expected: usize, actual: usize },

    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Returns `true` when the error rejects the data itself rather than
    /// reporting a storage fault.
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. } | Self::InvalidEmbedding(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
