//! Outbound gossip buffer, flushed once per epoch.

use meshledger_types::Hash;
use std::collections::HashSet;

/// Encoded transactions waiting for the next gossip tick.
#[derive(Debug, Default)]
pub struct SendBuffer {
    records: Vec<Vec<u8>>,
    seen: HashSet<Hash>,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a record. Returns `false` if the same bytes are already queued.
    pub fn push(&mut self, record: Vec<u8>) -> bool {
        if !self.seen.insert(Hash::compute(&record)) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Take every queued record, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        self.seen.clear();
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
