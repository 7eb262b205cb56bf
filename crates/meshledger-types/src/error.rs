use thiserror::Error;

/// Failures decoding or validating the shared data types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("Malformed address: {0}")]
    InvalidAddressFormat(String),

    #[error("Address must be 20 bytes, got {0}")]
    InvalidAddressLength(usize),

    #[error("Hash must be 32 bytes, got {0}")]
    InvalidHashLength(usize),

    #[error("Bad hex: {0}")]
    InvalidHex(String),

    #[error("Bad bech32 address: {0}")]
    Bech32Error(String),

    /// Transaction method outside `transfer` / `createAccount`
    #[error("Unknown contract method: {0}")]
    UnknownMethod(String),

    #[error("Encoding failed: {0}")]
    Serialization(String),

    #[error("Decoding failed: {0}")]
    Deserialization(String),
}

impl From<hex::FromHexError> for TypesError {
    fn from(e: hex::FromHexError) -> Self {
        TypesError::InvalidHex(e.to_string())
    }
}
