//! One node's working state: accounts, transactions and receipts.

use crate::error::StorageError;
use crate::state_ledger::StateLedger;
use meshledger_types::{Account, Address, BlockHeader, Hash, SerializedRecord, ToRecord};

/// Committed roots of the three ledgers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LedgerRoots {
    pub state_root: Option<Hash>,
    pub transactions_root: Option<Hash>,
    pub receipts_root: Option<Hash>,
}

impl LedgerRoots {
    /// Header encoding of the roots; an empty ledger commits to `Hash::ZERO`.
    pub fn header_fields(&self) -> (Hash, Hash, Hash) {
        (
            self.state_root.unwrap_or(Hash::ZERO),
            self.transactions_root.unwrap_or(Hash::ZERO),
            self.receipts_root.unwrap_or(Hash::ZERO),
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct LedgerStore {
    pub accounts: StateLedger,
    pub transactions: StateLedger,
    pub receipts: StateLedger,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded account snapshot.
    pub fn account(&self, address: &Address) -> Result<Option<Account>, StorageError> {
        self.accounts
            .search(address.as_bytes())
            .map(|record| Account::from_record(&record))
            .transpose()
            .map_err(StorageError::from)
    }

    pub fn upsert_account(&mut self, account: &Account) -> Result<(), StorageError> {
        self.accounts.upsert(account.to_record()?);
        Ok(())
    }

    pub fn contains_transaction(&self, fingerprint: &Hash) -> bool {
        self.transactions.contains(fingerprint.as_bytes())
    }

    /// Store an encoded transaction under its fingerprint.
    pub fn upsert_transaction(&mut self, fingerprint: &Hash, encoded: Vec<u8>) {
        self.transactions
            .upsert(SerializedRecord::new(fingerprint.as_bytes().to_vec(), encoded));
    }

    pub fn roots(&self) -> LedgerRoots {
        LedgerRoots {
            state_root: self.accounts.root_hash(),
            transactions_root: self.transactions.root_hash(),
            receipts_root: self.receipts.root_hash(),
        }
    }

    /// Check that the committed roots match what `header` recorded.
    pub fn verify_against(&self, header: &BlockHeader) -> Result<(), StorageError> {
        let (state, transactions, receipts) = self.roots().header_fields();
        for (ledger, expected, actual) in [
            ("accounts", header.state_root, state),
            ("transactions", header.transactions_root, transactions),
            ("receipts", header.receipts_root, receipts),
        ] {
            if expected != actual {
                return Err(StorageError::RootMismatch {
                    ledger,
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.accounts.reset();
        self.transactions.reset();
        self.receipts.reset();
    }
}
