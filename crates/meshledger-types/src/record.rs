//! Identity + payload wrapper that gives any domain value a stable sort and hash key.
//!
//! Equality, ordering and hashing look at `id` only: two records with the same id and
//! different payloads occupy the same slot, which is what upsert relies on.

use borsh::{BorshDeserialize, BorshSerialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::TypesError;
use crate::hash::Hash;

#[derive(Clone, Default, BorshSerialize, BorshDeserialize)]
pub struct SerializedRecord {
    /// Ordering key (address bytes, or a content fingerprint)
    pub id: Vec<u8>,
    /// Encoded domain value
    pub payload: Vec<u8>,
}

impl SerializedRecord {
    pub fn new(id: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    /// blake3 of the payload; this is the Merkle leaf for the record.
    pub fn payload_hash(&self) -> Hash {
        Hash::compute(&self.payload)
    }

    /// Decode the payload into a borsh type.
    pub fn decode<T: BorshDeserialize>(&self) -> Result<T, TypesError> {
        borsh::from_slice(&self.payload).map_err(|e| TypesError::Deserialization(e.to_string()))
    }

    /// True when both id and payload match.
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id && self.payload == other.payload
    }
}

impl PartialEq for SerializedRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SerializedRecord {}

impl PartialOrd for SerializedRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SerializedRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for SerializedRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SerializedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedRecord {{ id: 0x{}, payload: {} bytes }}",
            hex::encode(&self.id),
            self.payload.len()
        )
    }
}

/// Domain values that know their own record identity.
pub trait ToRecord {
    fn record_id(&self) -> Vec<u8>;

    fn to_record(&self) -> Result<SerializedRecord, TypesError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_payload() {
        let a = SerializedRecord::new(vec![1, 2, 3], b"first".to_vec());
        let b = SerializedRecord::new(vec![1, 2, 3], b"second".to_vec());
        assert_eq!(a, b);
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_ordering_by_id() {
        let low = SerializedRecord::new(vec![0, 9], b"z".to_vec());
        let high = SerializedRecord::new(vec![1, 0], b"a".to_vec());
        assert!(low < high);
    }

    #[test]
    fn test_payload_hash() {
        let rec = SerializedRecord::new(vec![1], b"payload".to_vec());
        assert_eq!(rec.payload_hash(), Hash::compute(b"payload"));
    }

    #[test]
    fn test_decode_payload() {
        let value: u64 = 42;
        let rec = SerializedRecord::new(vec![1], borsh::to_vec(&value).unwrap());
        assert_eq!(rec.decode::<u64>().unwrap(), 42);
        assert!(SerializedRecord::new(vec![1], vec![1]).decode::<u64>().is_err());
    }
}
