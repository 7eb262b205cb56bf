use thiserror::Error;

/// Signing and verification failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Public key is not a valid ed25519 point")]
    InvalidPublicKey,

    #[error("Signature does not verify")]
    VerificationFailed,

    /// The recovered signer is not the transaction's claimed sender
    #[error("Signed by {derived}, but claims sender {claimed}")]
    SignerMismatch { claimed: String, derived: String },

    #[error("Seed must be 32 bytes, got {0}")]
    InvalidSeedLength(usize),
}
