//! Persistence collaborator for committed blocks, accounts and transactions.

use crate::error::StorageError;
use async_trait::async_trait;
use meshledger_types::{Account, Address, Block, Hash, SignedTransaction};

/// Result of a halt-if-exists batch write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub saved: usize,
    /// Keys that were already present and left untouched
    pub skipped: Vec<Hash>,
}

/// Durable block and state storage.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store a block. Fails with `BlockExists` when its number is taken.
    async fn save_block(&self, block: &Block) -> Result<(), StorageError>;

    async fn block_by_number(&self, number: u64) -> Result<Option<Block>, StorageError>;

    async fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StorageError>;

    /// The chain tip.
    async fn latest_block(&self) -> Result<Option<Block>, StorageError>;

    /// Blocks with number >= `number`, ascending.
    async fn blocks_from(&self, number: u64) -> Result<Vec<Block>, StorageError>;

    async fn save_account(&self, account: &Account) -> Result<(), StorageError>;

    async fn account(&self, address: &Address) -> Result<Option<Account>, StorageError>;

    /// Returns whether an account was removed.
    async fn delete_account(&self, address: &Address) -> Result<bool, StorageError>;

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), StorageError>;

    /// Store transactions keyed by fingerprint. Existing fingerprints are skipped.
    async fn save_transactions(
        &self,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError>;

    async fn transaction(&self, fingerprint: &Hash) -> Result<Option<SignedTransaction>, StorageError>;

    /// Persist a block together with its transactions and account snapshot as one unit.
    /// On any error, including `BlockExists`, nothing of the block is stored.
    async fn commit_block(
        &self,
        block: &Block,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError>;
}
