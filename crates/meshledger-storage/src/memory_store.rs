//! In-memory durable store for tests and simulations.

use crate::durable::{DurableStore, SaveOutcome};
use crate::error::StorageError;
use async_trait::async_trait;
use meshledger_types::{Account, Address, Block, Hash, SignedTransaction};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<u64, Block>,
    block_numbers: HashMap<Hash, u64>,
    accounts: HashMap<Address, Account>,
    transactions: HashMap<Hash, SignedTransaction>,
}

impl Inner {
    fn insert_block(&mut self, block: &Block) -> Result<(), StorageError> {
        if self.blocks.contains_key(&block.number()) {
            return Err(StorageError::BlockExists(block.number()));
        }
        self.block_numbers.insert(block.hash(), block.number());
        self.blocks.insert(block.number(), block.clone());
        Ok(())
    }

    fn insert_transactions(&mut self, transactions: &[(Hash, SignedTransaction)]) -> SaveOutcome {
        let mut outcome = SaveOutcome::default();
        for (fingerprint, tx) in transactions {
            if self.transactions.contains_key(fingerprint) {
                outcome.skipped.push(*fingerprint);
                continue;
            }
            self.transactions.insert(*fingerprint, tx.clone());
            outcome.saved += 1;
        }
        outcome
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.inner.read().blocks.len()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        self.inner.write().insert_block(block)
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<Block>, StorageError> {
        Ok(self.inner.read().blocks.get(&number).cloned())
    }

    async fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StorageError> {
        let inner = self.inner.read();
        Ok(inner
            .block_numbers
            .get(hash)
            .and_then(|n| inner.blocks.get(n))
            .cloned())
    }

    async fn latest_block(&self) -> Result<Option<Block>, StorageError> {
        Ok(self.inner.read().blocks.values().next_back().cloned())
    }

    async fn blocks_from(&self, number: u64) -> Result<Vec<Block>, StorageError> {
        Ok(self.inner.read().blocks.range(number..).map(|(_, b)| b.clone()).collect())
    }

    async fn save_account(&self, account: &Account) -> Result<(), StorageError> {
        self.inner.write().accounts.insert(account.address, account.clone());
        Ok(())
    }

    async fn account(&self, address: &Address) -> Result<Option<Account>, StorageError> {
        Ok(self.inner.read().accounts.get(address).cloned())
    }

    async fn delete_account(&self, address: &Address) -> Result<bool, StorageError> {
        Ok(self.inner.write().accounts.remove(address).is_some())
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        for account in accounts {
            inner.accounts.insert(account.address, account.clone());
        }
        Ok(())
    }

    async fn save_transactions(
        &self,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError> {
        Ok(self.inner.write().insert_transactions(transactions))
    }

    async fn transaction(&self, fingerprint: &Hash) -> Result<Option<SignedTransaction>, StorageError> {
        Ok(self.inner.read().transactions.get(fingerprint).cloned())
    }

    async fn commit_block(
        &self,
        block: &Block,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError> {
        let mut inner = self.inner.write();
        // The only failure is a taken block number, checked before anything is written
        inner.insert_block(block)?;
        for account in &block.accounts {
            inner.accounts.insert(account.address, account.clone());
        }
        Ok(inner.insert_transactions(transactions))
    }
}
