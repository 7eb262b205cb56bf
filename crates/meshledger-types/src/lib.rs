//! MeshLedger Types - Core type definitions for the MeshLedger replicated ledger.
//!
//! This crate provides the fundamental types shared by every layer:
//! - Addresses (20-byte, Bech32m encoded)
//! - Hashes (32-byte, blake3 digests)
//! - Accounts, Transactions, Blocks, Receipts
//! - Serialized records, the identity + payload wrapper the ledger indexes

pub mod address;
pub mod hash;
pub mod account;
pub mod transaction;
pub mod block;
pub mod receipt;
pub mod record;
pub mod signature;
pub mod peer;
pub mod error;

pub use address::Address;
pub use hash::Hash;
pub use account::Account;
pub use transaction::{ContractMethod, ExtraData, SignedTransaction, Transaction};
pub use block::{Block, BlockHeader};
pub use receipt::Receipt;
pub use record::{SerializedRecord, ToRecord};
pub use signature::{Ed25519PublicKey, Ed25519Signature};
pub use peer::PeerId;
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Account, Address, Block, BlockHeader, ContractMethod, Ed25519PublicKey,
        Ed25519Signature, ExtraData, Hash, PeerId, Receipt, SerializedRecord, SignedTransaction, ToRecord,
        Transaction, TypesError,
    };
}
