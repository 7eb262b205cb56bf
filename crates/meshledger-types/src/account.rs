use crate::address::Address;
use crate::error::TypesError;
use crate::hash::Hash;
use crate::record::{SerializedRecord, ToRecord};
use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt;

/// Ledger account state. Mutated only by the orchestrator when it applies a validated
/// transfer or creation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, BorshSerialize, BorshDeserialize)]
pub struct Account {
    pub address: Address,
    /// Transaction count (nonce)
    pub nonce: u64,
    pub balance: u128,
    /// Hash of contract code (Hash::ZERO for plain accounts)
    pub code_hash: Hash,
    /// Root hash of the account's storage (Hash::ZERO if empty)
    pub storage_root: Hash,
}

impl Account {
    /// Create a new account with the given opening balance
    pub fn new(address: Address, balance: u128) -> Self {
        Self {
            address,
            nonce: 0,
            balance,
            code_hash: Hash::ZERO,
            storage_root: Hash::ZERO,
        }
    }

    /// Check if account is empty (nonce=0, balance=0, no code)
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance == 0 && self.code_hash.is_zero()
    }

    pub fn has_code(&self) -> bool {
        !self.code_hash.is_zero()
    }

    pub fn can_afford(&self, amount: u128) -> bool {
        self.balance >= amount
    }

    pub fn increment_nonce(&mut self) {
        self.nonce = self.nonce.saturating_add(1);
    }

    pub fn add_balance(&mut self, amount: u128) {
        self.balance = self.balance.saturating_add(amount);
    }

    pub fn sub_balance(&mut self, amount: u128) {
        self.balance = self.balance.saturating_sub(amount);
    }

    pub fn from_record(record: &SerializedRecord) -> Result<Self, TypesError> {
        record.decode()
    }
}

impl ToRecord for Account {
    fn record_id(&self) -> Vec<u8> {
        self.address.as_bytes().to_vec()
    }

    fn to_record(&self) -> Result<SerializedRecord, TypesError> {
        let payload =
            borsh::to_vec(self).map_err(|e| TypesError::Serialization(e.to_string()))?;
        Ok(SerializedRecord::new(self.record_id(), payload))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Account {{ address: {}, nonce: {}, balance: {} }}",
            self.address, self.nonce, self.balance
        )
    }
}
