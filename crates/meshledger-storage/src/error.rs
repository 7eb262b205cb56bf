use crate::index::InvariantViolation;
use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Root mismatch in {ledger} ledger: expected {expected}, got {actual}")]
    RootMismatch {
        ledger: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Block {0} already stored")]
    BlockExists(u64),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Tree invariant violated: {0}")]
    TreeInvariant(#[from] InvariantViolation),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<meshledger_types::TypesError> for StorageError {
    fn from(e: meshledger_types::TypesError) -> Self {
        StorageError::Deserialization(e.to_string())
    }
}
