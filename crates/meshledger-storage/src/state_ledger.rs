//! An index whose content determines a cached Merkle root.

use crate::index::{InvariantViolation, RedBlackTree};
use meshledger_crypto::merkle_root;
use meshledger_types::{Hash, SerializedRecord};
use std::sync::OnceLock;

/// Ordered record set plus a lazily computed commitment over its payloads.
///
/// The root covers payloads in id order, so it depends only on the current contents and
/// never on insertion history. Every mutation drops the cached root.
#[derive(Clone, Debug, Default)]
pub struct StateLedger {
    tree: RedBlackTree,
    root: OnceLock<Option<Hash>>,
}

impl StateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever sits under `record.id` with `record`. Returns the previous record.
    pub fn upsert(&mut self, record: SerializedRecord) -> Option<SerializedRecord> {
        self.invalidate();
        let previous = self.tree.delete(&record.id);
        self.tree.insert(record);
        previous
    }

    /// Upsert every record, in order. Later records win over earlier ones with the same id.
    pub fn upsert_batch<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = SerializedRecord>,
    {
        self.invalidate();
        for record in records {
            self.tree.delete(&record.id);
            self.tree.insert(record);
        }
    }

    pub fn remove(&mut self, id: &[u8]) -> Option<SerializedRecord> {
        let removed = self.tree.delete(id);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Snapshot of the record stored under `id`.
    pub fn search(&self, id: &[u8]) -> Option<SerializedRecord> {
        self.tree.search(id)
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.tree.contains(id)
    }

    pub fn count(&self) -> usize {
        self.tree.count()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Records in id order.
    pub fn all_elements(&self) -> Vec<SerializedRecord> {
        self.tree.all_elements()
    }

    pub fn iter(&self) -> crate::index::Iter<'_> {
        self.tree.iter()
    }

    /// Merkle root over the payloads in id order, `None` when empty.
    pub fn root_hash(&self) -> Option<Hash> {
        *self
            .root
            .get_or_init(|| merkle_root(self.tree.iter().map(|r| r.payload.as_slice())))
    }

    /// Drop every record.
    pub fn reset(&mut self) {
        self.tree.clear();
        self.invalidate();
    }

    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.tree.verify()
    }

    fn invalidate(&mut self) {
        self.root = OnceLock::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(id: u8, payload: &str) -> SerializedRecord {
        SerializedRecord::new(vec![id], payload.as_bytes().to_vec())
    }

    #[test]
    fn test_empty_ledger_has_no_root() {
        let ledger = StateLedger::new();
        assert_eq!(ledger.root_hash(), None);
    }

    #[test]
    fn test_upsert_replaces_without_growing() {
        let mut ledger = StateLedger::new();
        ledger.upsert(rec(1, "a"));
        ledger.upsert(rec(2, "b"));

        let previous = ledger.upsert(rec(1, "a2")).unwrap();
        assert_eq!(previous.payload, b"a");
        assert_eq!(ledger.count(), 2);
        assert_eq!(ledger.search(&[1]).unwrap().payload, b"a2");
    }

    #[test]
    fn test_root_changes_with_content_and_is_cached() {
        let mut ledger = StateLedger::new();
        ledger.upsert(rec(1, "a"));
        let first = ledger.root_hash();
        assert_eq!(first, ledger.root_hash());

        ledger.upsert(rec(1, "changed"));
        assert_ne!(ledger.root_hash(), first);
    }

    #[test]
    fn test_remove_and_reinsert_restores_root() {
        let mut ledger = StateLedger::new();
        ledger.upsert_batch(vec![rec(1, "a"), rec(2, "b"), rec(3, "c")]);
        let before = ledger.root_hash();

        let removed = ledger.remove(&[2]).unwrap();
        assert_ne!(ledger.root_hash(), before);

        ledger.upsert(removed);
        assert_eq!(ledger.root_hash(), before);
    }

    #[test]
    fn test_remove_missing_keeps_root() {
        let mut ledger = StateLedger::new();
        ledger.upsert(rec(1, "a"));
        let before = ledger.root_hash();
        assert!(ledger.remove(&[9]).is_none());
        assert_eq!(ledger.root_hash(), before);
    }

    #[test]
    fn test_reset() {
        let mut ledger = StateLedger::new();
        ledger.upsert_batch(vec![rec(1, "a"), rec(2, "b")]);
        ledger.reset();
        assert!(ledger.is_empty());
        assert_eq!(ledger.root_hash(), None);
    }

    #[test]
    fn test_clone_stages_independently() {
        let mut ledger = StateLedger::new();
        ledger.upsert(rec(1, "a"));
        let committed = ledger.root_hash();

        let mut staged = ledger.clone();
        staged.upsert(rec(2, "b"));

        assert_eq!(ledger.root_hash(), committed);
        assert_ne!(staged.root_hash(), committed);
    }

    proptest! {
        #[test]
        fn prop_root_independent_of_insertion_order(
            entries in prop::collection::btree_map(any::<u8>(), prop::collection::vec(any::<u8>(), 0..16), 1..40)
        ) {
            let records: Vec<SerializedRecord> = entries
                .iter()
                .map(|(k, v)| SerializedRecord::new(vec![*k], v.clone()))
                .collect();

            let mut forward = StateLedger::new();
            forward.upsert_batch(records.clone());

            let mut backward = StateLedger::new();
            for record in records.into_iter().rev() {
                backward.upsert(record);
            }

            prop_assert_eq!(forward.root_hash(), backward.root_hash());
            prop_assert_eq!(forward.count(), backward.count());
            prop_assert!(forward.verify().is_ok());
        }
    }
}
