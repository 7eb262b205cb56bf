//! MeshLedger Storage - ordered ledger index, state commitments and durable storage.
//!
//! - [`index::RedBlackTree`]: the self-balancing index over serialized records
//! - [`StateLedger`]: an index with a cached Merkle root
//! - [`LedgerStore`]: the accounts / transactions / receipts trio of one node
//! - [`DurableStore`]: persistence collaborator, with in-memory and JSON file backends
//! - [`Codec`]: borsh encoding plus zstd compression for wire payloads

pub mod index;
pub mod state_ledger;
pub mod ledger_store;
pub mod durable;
pub mod memory_store;
pub mod file_store;
pub mod codec;
pub mod error;

pub use index::{InvariantViolation, Iter, RedBlackTree};
pub use state_ledger::StateLedger;
pub use ledger_store::{LedgerRoots, LedgerStore};
pub use durable::{DurableStore, SaveOutcome};
pub use memory_store::MemoryStore;
pub use file_store::FileStore;
pub use codec::{BorshZstdCodec, Codec};
pub use error::StorageError;
