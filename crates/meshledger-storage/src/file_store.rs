//! Durable store backed by a single JSON document of hex-encoded borsh values.

use crate::durable::{DurableStore, SaveOutcome};
use crate::error::StorageError;
use async_trait::async_trait;
use borsh::{BorshDeserialize, BorshSerialize};
use meshledger_types::{Account, Address, Block, Hash, SignedTransaction};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DATA_FILE: &str = "data.json";

/// Column families for organized data storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    /// block_number (big endian) → Block
    Blocks,
    /// block_hash → block_number
    BlockIndex,
    /// address → Account
    Accounts,
    /// fingerprint → SignedTransaction
    Transactions,
}

impl Column {
    fn name(&self) -> &'static str {
        match self {
            Column::Blocks => "blocks",
            Column::BlockIndex => "block_index",
            Column::Accounts => "accounts",
            Column::Transactions => "transactions",
        }
    }
}

type BatchWrite = (Column, Vec<u8>, Option<Vec<u8>>);

pub struct FileStore {
    path: PathBuf,
    data: RwLock<Value>,
}

impl FileStore {
    /// Open (or create) a store in `dir`.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;

        let data_file = dir.join(DATA_FILE);
        let data = if data_file.exists() {
            let content = fs::read_to_string(&data_file)?;
            serde_json::from_str(&content)?
        } else {
            Value::Object(Map::new())
        };

        debug!(path = %dir.display(), "Opened file store");
        Ok(Self {
            path: dir.to_path_buf(),
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        lookup(&self.data.read(), column, key)
    }

    fn get_decoded<T: BorshDeserialize>(
        &self,
        column: Column,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        self.get(column, key)?
            .map(|bytes| {
                borsh::from_slice(&bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
            })
            .transpose()
    }

    fn keys(&self, column: Column) -> Result<Vec<Vec<u8>>, StorageError> {
        let data = self.data.read();
        let Some(Value::Object(entries)) = data.get(column.name()) else {
            return Ok(Vec::new());
        };
        entries
            .keys()
            .map(|k| hex::decode(k).map_err(|e| StorageError::Deserialization(e.to_string())))
            .collect()
    }

    /// Apply puts (`Some`) and deletes (`None`) and persist once.
    fn write_batch(&self, writes: Vec<BatchWrite>) -> Result<(), StorageError> {
        self.write_batch_with(|_| Ok((writes, ())))
    }

    /// Build a batch against the current contents and persist it under one write lock.
    /// The in-memory view changes only after the file is written.
    fn write_batch_with<R>(
        &self,
        build: impl FnOnce(&Value) -> Result<(Vec<BatchWrite>, R), StorageError>,
    ) -> Result<R, StorageError> {
        let mut data = self.data.write();
        let (writes, result) = build(&*data)?;
        if writes.is_empty() {
            return Ok(result);
        }

        let mut staged = data.clone();
        if !staged.is_object() {
            staged = Value::Object(Map::new());
        }
        if let Value::Object(root) = &mut staged {
            for (column, key, value) in writes {
                let entries = root
                    .entry(column.name())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(entries) = entries {
                    match value {
                        Some(value) => {
                            entries.insert(hex::encode(key), Value::String(hex::encode(value)));
                        }
                        None => {
                            entries.remove(&hex::encode(key));
                        }
                    }
                }
            }
        }

        self.persist(&staged)?;
        *data = staged;
        Ok(result)
    }

    fn persist(&self, data: &Value) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(data)?;
        let tmp = self.path.join(format!("{}.tmp", DATA_FILE));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, self.path.join(DATA_FILE))?;
        Ok(())
    }
}

fn lookup(data: &Value, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
    match data.get(column.name()).and_then(|c| c.get(hex::encode(key))) {
        Some(Value::String(value)) => Ok(Some(
            hex::decode(value).map_err(|e| StorageError::Deserialization(e.to_string()))?,
        )),
        Some(_) => Err(StorageError::Deserialization(format!(
            "non-string value in column {}",
            column.name()
        ))),
        None => Ok(None),
    }
}

/// Transaction puts for fingerprints not yet stored; existing ones are reported as skipped.
fn transaction_writes(
    data: &Value,
    transactions: &[(Hash, SignedTransaction)],
) -> Result<(Vec<BatchWrite>, SaveOutcome), StorageError> {
    let mut outcome = SaveOutcome::default();
    let mut writes = Vec::with_capacity(transactions.len());
    for (fingerprint, tx) in transactions {
        if lookup(data, Column::Transactions, fingerprint.as_bytes())?.is_some() {
            outcome.skipped.push(*fingerprint);
            continue;
        }
        writes.push((Column::Transactions, fingerprint.as_bytes().to_vec(), Some(encode(tx)?)));
        outcome.saved += 1;
    }
    Ok((writes, outcome))
}

fn block_writes(data: &Value, block: &Block) -> Result<Vec<BatchWrite>, StorageError> {
    let number = block.number().to_be_bytes();
    if lookup(data, Column::Blocks, &number)?.is_some() {
        return Err(StorageError::BlockExists(block.number()));
    }
    Ok(vec![
        (Column::Blocks, number.to_vec(), Some(encode(block)?)),
        (Column::BlockIndex, block.hash().as_bytes().to_vec(), Some(number.to_vec())),
    ])
}

fn encode<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    borsh::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl DurableStore for FileStore {
    async fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        self.write_batch_with(|data| Ok((block_writes(data, block)?, ())))?;
        debug!(number = block.number(), hash = %block.hash(), "Block persisted");
        Ok(())
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<Block>, StorageError> {
        self.get_decoded(Column::Blocks, &number.to_be_bytes())
    }

    async fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StorageError> {
        match self.get(Column::BlockIndex, hash.as_bytes())? {
            Some(number) => self.get_decoded(Column::Blocks, &number),
            None => Ok(None),
        }
    }

    async fn latest_block(&self) -> Result<Option<Block>, StorageError> {
        let latest = self.keys(Column::Blocks)?.into_iter().max();
        match latest {
            Some(key) => self.get_decoded(Column::Blocks, &key),
            None => Ok(None),
        }
    }

    async fn blocks_from(&self, number: u64) -> Result<Vec<Block>, StorageError> {
        let mut keys: Vec<Vec<u8>> = self
            .keys(Column::Blocks)?
            .into_iter()
            .filter(|k| k.as_slice() >= number.to_be_bytes().as_slice())
            .collect();
        keys.sort();

        let mut blocks = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(block) = self.get_decoded(Column::Blocks, &key)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    async fn save_account(&self, account: &Account) -> Result<(), StorageError> {
        self.save_accounts(std::slice::from_ref(account)).await
    }

    async fn account(&self, address: &Address) -> Result<Option<Account>, StorageError> {
        self.get_decoded(Column::Accounts, address.as_bytes())
    }

    async fn delete_account(&self, address: &Address) -> Result<bool, StorageError> {
        if self.get(Column::Accounts, address.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.write_batch(vec![(Column::Accounts, address.as_bytes().to_vec(), None)])?;
        Ok(true)
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), StorageError> {
        let writes = accounts
            .iter()
            .map(|a| Ok((Column::Accounts, a.address.as_bytes().to_vec(), Some(encode(a)?))))
            .collect::<Result<Vec<BatchWrite>, StorageError>>()?;
        if writes.is_empty() {
            return Ok(());
        }
        self.write_batch(writes)
    }

    async fn save_transactions(
        &self,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError> {
        self.write_batch_with(|data| transaction_writes(data, transactions))
    }

    async fn transaction(&self, fingerprint: &Hash) -> Result<Option<SignedTransaction>, StorageError> {
        self.get_decoded(Column::Transactions, fingerprint.as_bytes())
    }

    async fn commit_block(
        &self,
        block: &Block,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError> {
        let outcome = self.write_batch_with(|data| {
            let mut writes = block_writes(data, block)?;
            for account in &block.accounts {
                writes.push((Column::Accounts, account.address.as_bytes().to_vec(), Some(encode(account)?)));
            }
            let (tx_writes, outcome) = transaction_writes(data, transactions)?;
            writes.extend(tx_writes);
            Ok((writes, outcome))
        })?;
        debug!(number = block.number(), hash = %block.hash(), saved = outcome.saved, "Block committed");
        Ok(outcome)
    }
}
