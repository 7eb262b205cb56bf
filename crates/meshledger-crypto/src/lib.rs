//! MeshLedger Crypto - Cryptographic primitives for the MeshLedger replicated ledger.
//!
//! This crate provides:
//! - Ed25519 keypairs and signature verification
//! - The `Signer` collaborator used by the transaction pipeline
//! - Blake3 leaf and node hashing for Merkle commitments
//! - Merkle commitments over ordered payload sequences, with inclusion proofs

pub mod ed25519;
pub mod signer;
pub mod hash;
pub mod merkle;
pub mod error;

pub use ed25519::{Keypair, verify as ed25519_verify};
pub use signer::{Ed25519Signer, Signer};
pub use merkle::{MerkleTree, MerkleProof, merkle_root};
pub use error::CryptoError;
