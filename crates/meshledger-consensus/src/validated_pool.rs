//! Transactions that passed the pipeline and wait for the next block.

use crate::error::ConsensusError;
use crate::execution::{execute, is_nonce_gap};
use meshledger_storage::LedgerStore;
use meshledger_types::{Account, Address, Hash, SignedTransaction};
use std::collections::HashMap;
use tracing::debug;

/// A transaction accepted by the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedTx {
    pub fingerprint: Hash,
    pub tx: SignedTransaction,
    /// Encoded form stored in the transaction ledger
    pub encoded: Vec<u8>,
}

impl ValidatedTx {
    /// Ordering key for block assembly: the sender-supplied transaction timestamp, then
    /// the fingerprint. Local arrival or validation time differs between peers and is not
    /// part of the order, so every peer executes the same batch in the same sequence.
    pub fn order_key(&self) -> (u64, Hash) {
        (self.tx.tx.timestamp, self.fingerprint)
    }
}

/// Validated transactions plus the projected accounts they produce on top of the
/// committed ledger.
#[derive(Clone, Debug, Default)]
pub struct ValidatedPool {
    transactions: HashMap<Hash, ValidatedTx>,
    accounts: HashMap<Address, Account>,
}

impl ValidatedPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fingerprint: &Hash) -> bool {
        self.transactions.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Projected account, if a pending transaction touched it.
    pub fn projected_account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Record an accepted transaction with the accounts it touched.
    pub fn insert(&mut self, entry: ValidatedTx, touched: Vec<Account>) {
        for account in touched {
            self.accounts.insert(account.address, account);
        }
        self.transactions.insert(entry.fingerprint, entry);
    }

    /// Entries in assembly order.
    pub fn ordered(&self) -> Vec<ValidatedTx> {
        let mut entries: Vec<ValidatedTx> = self.transactions.values().cloned().collect();
        entries.sort_by_key(ValidatedTx::order_key);
        entries
    }

    /// Account as seen by the next dispatch: projected first, then committed.
    pub fn lookup(&self, ledger: &LedgerStore, address: &Address) -> Result<Option<Account>, ConsensusError> {
        match self.accounts.get(address) {
            Some(account) => Ok(Some(account.clone())),
            None => Ok(ledger.account(address)?),
        }
    }

    /// Rebuild the projection on top of a new committed ledger. Entries already committed
    /// leave the pool; entries still waiting on an earlier nonce stay; entries that no longer
    /// apply are dropped and returned.
    pub fn rebase(&mut self, ledger: &LedgerStore, chain_id: u64) -> Vec<Hash> {
        self.transactions
            .retain(|fingerprint, _| !ledger.contains_transaction(fingerprint));
        self.accounts.clear();

        let mut dropped = Vec::new();
        for entry in self.ordered() {
            let result = execute(&entry.tx, chain_id, |addr| self.lookup(ledger, addr));
            match result {
                Ok(touched) => {
                    for account in touched {
                        self.accounts.insert(account.address, account);
                    }
                }
                Err(e) if is_nonce_gap(&e) => {}
                Err(e) => {
                    debug!(fingerprint = %entry.fingerprint, error = %e, "Dropping stale validated transaction");
                    self.transactions.remove(&entry.fingerprint);
                    dropped.push(entry.fingerprint);
                }
            }
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
        self.accounts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshledger_crypto::Keypair;
    use meshledger_types::Transaction;

    const CHAIN: u64 = 1;

    fn entry(tx: SignedTransaction, fingerprint: &[u8]) -> ValidatedTx {
        ValidatedTx {
            fingerprint: Hash::compute(fingerprint),
            tx,
            encoded: Vec::new(),
        }
    }

    #[test]
    fn test_insert_and_projection() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let tx = kp.sign_transaction(Transaction::create_account(CHAIN, kp.address(), 50, 0, 10).unwrap());
        let mut pool = ValidatedPool::new();
        pool.insert(entry(tx, b"a"), vec![Account::new(kp.address(), 50)]);

        assert!(pool.contains(&Hash::compute(b"a")));
        assert_eq!(pool.projected_account(&kp.address()).unwrap().balance, 50);
        let ledger = LedgerStore::new();
        assert_eq!(pool.lookup(&ledger, &kp.address()).unwrap().unwrap().balance, 50);
    }

    #[test]
    fn test_ordered_by_timestamp_then_fingerprint() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let late = kp.sign_transaction(Transaction::create_account(CHAIN, kp.address(), 1, 0, 20).unwrap());
        let early = kp.sign_transaction(Transaction::create_account(CHAIN, kp.address(), 2, 0, 10).unwrap());

        let mut pool = ValidatedPool::new();
        pool.insert(entry(late, b"late"), Vec::new());
        pool.insert(entry(early, b"early"), Vec::new());

        let order: Vec<u64> = pool.ordered().iter().map(|e| e.tx.tx.timestamp).collect();
        assert_eq!(order, vec![10, 20]);
    }

    #[test]
    fn test_rebase_drops_committed_and_stale() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let create = kp.sign_transaction(Transaction::create_account(CHAIN, kp.address(), 50, 0, 1).unwrap());
        let spend = kp.sign_transaction(
            Transaction::transfer(CHAIN, kp.address(), Address::from_bytes([9u8; 20]), 0, 80, 0, 2).unwrap(),
        );

        let mut pool = ValidatedPool::new();
        pool.insert(entry(create, b"create"), vec![Account::new(kp.address(), 50)]);
        pool.insert(entry(spend, b"spend"), Vec::new());

        // The create was committed elsewhere with a smaller balance
        let mut ledger = LedgerStore::new();
        ledger.upsert_account(&Account::new(kp.address(), 50)).unwrap();
        ledger.upsert_transaction(&Hash::compute(b"create"), Vec::new());

        let dropped = pool.rebase(&ledger, CHAIN);
        assert_eq!(dropped, vec![Hash::compute(b"spend")]);
        assert!(pool.is_empty());
        assert!(pool.projected_account(&kp.address()).is_none());
    }

    #[test]
    fn test_rebase_keeps_transfers_behind_a_nonce_gap() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let to = Address::from_bytes([9u8; 20]);
        let ahead = kp.sign_transaction(Transaction::transfer(CHAIN, kp.address(), to, 2, 5, 0, 3).unwrap());
        let replayed = kp.sign_transaction(Transaction::transfer(CHAIN, kp.address(), to, 0, 5, 0, 4).unwrap());

        let mut pool = ValidatedPool::new();
        pool.insert(entry(ahead, b"ahead"), Vec::new());
        pool.insert(entry(replayed, b"replayed"), Vec::new());

        let mut ledger = LedgerStore::new();
        let mut account = Account::new(kp.address(), 50);
        account.nonce = 1;
        ledger.upsert_account(&account).unwrap();

        assert_eq!(pool.rebase(&ledger, CHAIN), vec![Hash::compute(b"replayed")]);
        assert!(pool.contains(&Hash::compute(b"ahead")));
        assert!(pool.projected_account(&kp.address()).is_none());
    }
}
