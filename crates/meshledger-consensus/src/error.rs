use meshledger_crypto::CryptoError;
use meshledger_storage::StorageError;
use meshledger_types::TypesError;
use thiserror::Error;

/// Errors that can occur in consensus operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConsensusError {
    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Duplicate transaction: {0}")]
    Duplicate(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Sync required: local height {local}, advertised {advertised}")]
    SyncRequired { local: u64, advertised: u64 },

    #[error("Sync timed out after {0} ms")]
    SyncTimedOut(u64),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Consensus mismatch: {0}")]
    ConsensusMismatch(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Chain ID mismatch: expected {expected}, got {got}")]
    ChainIdMismatch { expected: u64, got: u64 },

    #[error("Invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("Insufficient balance: required {required}, have {have}")]
    InsufficientBalance { required: u128, have: u128 },

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<StorageError> for ConsensusError {
    fn from(e: StorageError) -> Self {
        ConsensusError::Store(e.to_string())
    }
}

impl From<CryptoError> for ConsensusError {
    fn from(e: CryptoError) -> Self {
        ConsensusError::InvalidSignature(e.to_string())
    }
}

impl From<TypesError> for ConsensusError {
    fn from(e: TypesError) -> Self {
        match e {
            TypesError::UnknownMethod(method) => ConsensusError::UnknownMethod(method),
            other => ConsensusError::Decoding(other.to_string()),
        }
    }
}
