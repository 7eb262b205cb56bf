use crate::address::Address;
use crate::error::TypesError;
use crate::hash::Hash;
use crate::record::{SerializedRecord, ToRecord};
use borsh::{BorshDeserialize, BorshSerialize};

/// Outcome of applying a transaction. The receipts ledger exists but block assembly does
/// not populate it yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct Receipt {
    /// Fingerprint of the transaction
    pub tx_fingerprint: Hash,
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub success: bool,
}

impl Receipt {
    pub fn new(
        tx_fingerprint: Hash,
        block_number: u64,
        from: Address,
        to: Option<Address>,
        success: bool,
    ) -> Self {
        Self {
            tx_fingerprint,
            block_number,
            from,
            to,
            success,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, TypesError> {
        borsh::to_vec(self).map_err(|e| TypesError::Serialization(e.to_string()))
    }
}

impl ToRecord for Receipt {
    fn record_id(&self) -> Vec<u8> {
        // content fingerprint
        self.encode()
            .map(|bytes| Hash::compute(&bytes).as_bytes().to_vec())
            .unwrap_or_default()
    }

    fn to_record(&self) -> Result<SerializedRecord, TypesError> {
        let payload = self.encode()?;
        Ok(SerializedRecord::new(
            Hash::compute(&payload).as_bytes().to_vec(),
            payload,
        ))
    }
}
