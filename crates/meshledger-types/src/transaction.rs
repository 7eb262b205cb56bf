use crate::address::Address;
use crate::error::TypesError;
use crate::hash::Hash;
use crate::signature::{Ed25519PublicKey, Ed25519Signature};
use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt;
use std::str::FromStr;

/// Contract method carried in a transaction's extra data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractMethod {
    Transfer,
    CreateAccount,
}

impl ContractMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractMethod::Transfer => "transfer",
            ContractMethod::CreateAccount => "createAccount",
        }
    }
}

impl FromStr for ContractMethod {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(ContractMethod::Transfer),
            "createAccount" => Ok(ContractMethod::CreateAccount),
            other => Err(TypesError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for ContractMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque extra-data blob: the target method and the chain height the sender had
/// when it signed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct ExtraData {
    pub method: String,
    pub chain_height: u64,
}

impl ExtraData {
    pub fn new(method: ContractMethod, chain_height: u64) -> Self {
        Self {
            method: method.as_str().to_string(),
            chain_height,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, TypesError> {
        borsh::to_vec(self).map_err(|e| TypesError::Serialization(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, TypesError> {
        borsh::from_slice(data).map_err(|e| TypesError::Deserialization(e.to_string()))
    }

    /// Parse the method name.
    pub fn contract_method(&self) -> Result<ContractMethod, TypesError> {
        self.method.parse()
    }
}

/// Unsigned transfer or creation intent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    /// Chain ID (replay protection)
    pub chain_id: u64,
    /// Claimed sender; must match the address derived from the signing key
    pub from: Address,
    /// Sender's nonce (increments with each TX)
    pub nonce: u64,
    /// Recipient (None for account creation)
    pub to: Option<Address>,
    pub value: u128,
    /// Sender wall clock, unix millis
    pub timestamp: u64,
    /// Encoded `ExtraData`
    pub data: Vec<u8>,
}

impl Transaction {
    /// Build a transfer from `from` to `to`, stamped with the sender's chain height.
    pub fn transfer(
        chain_id: u64,
        from: Address,
        to: Address,
        nonce: u64,
        value: u128,
        chain_height: u64,
        timestamp: u64,
    ) -> Result<Self, TypesError> {
        Ok(Self {
            chain_id,
            from,
            nonce,
            to: Some(to),
            value,
            timestamp,
            data: ExtraData::new(ContractMethod::Transfer, chain_height).encode()?,
        })
    }

    /// Build an account creation for `from` with an opening balance of `value`.
    pub fn create_account(
        chain_id: u64,
        from: Address,
        value: u128,
        chain_height: u64,
        timestamp: u64,
    ) -> Result<Self, TypesError> {
        Ok(Self {
            chain_id,
            from,
            nonce: 0,
            to: None,
            value,
            timestamp,
            data: ExtraData::new(ContractMethod::CreateAccount, chain_height).encode()?,
        })
    }

    /// Decode the embedded extra data.
    pub fn extra_data(&self) -> Result<ExtraData, TypesError> {
        ExtraData::decode(&self.data)
    }

    /// Compute the hash that should be signed
    pub fn signing_hash(&self) -> Hash {
        let mut data = Vec::with_capacity(128 + self.data.len());
        data.extend_from_slice(&self.chain_id.to_le_bytes());
        data.extend_from_slice(self.from.as_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        match self.to {
            Some(to) => data.extend_from_slice(to.as_bytes()),
            None => data.extend_from_slice(&[0u8; 20]),
        }
        data.extend_from_slice(&self.value.to_le_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.data);
        Hash::compute(&data)
    }
}

/// Transaction with signature attached.
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signature: Ed25519Signature,
    /// Signer public key; ed25519 cannot recover it from the signature alone
    pub public_key: Ed25519PublicKey,
}

impl SignedTransaction {
    pub fn new(tx: Transaction, signature: Ed25519Signature, public_key: Ed25519PublicKey) -> Self {
        Self {
            tx,
            signature,
            public_key,
        }
    }

    /// Hash over signing hash, signature and key.
    pub fn hash(&self) -> Hash {
        Hash::compute_multi(&[
            self.tx.signing_hash().as_bytes(),
            self.signature.as_bytes(),
            self.public_key.as_bytes(),
        ])
    }

    /// The sender the transaction claims.
    pub fn claimed_sender(&self) -> Address {
        self.tx.from
    }

    pub fn is_create(&self) -> bool {
        self.tx.to.is_none()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction {{ from: {}, nonce: {}, to: {:?}, value: {} }}",
            self.from, self.nonce, self.to, self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::from_bytes([1u8; 20])
    }

    fn bob() -> Address {
        Address::from_bytes([2u8; 20])
    }

    #[test]
    fn test_transfer_extra_data() {
        let tx = Transaction::transfer(1, alice(), bob(), 0, 100, 7, 1_000).unwrap();
        let extra = tx.extra_data().unwrap();
        assert_eq!(extra.contract_method().unwrap(), ContractMethod::Transfer);
        assert_eq!(extra.chain_height, 7);
        assert_eq!(tx.to, Some(bob()));
    }

    #[test]
    fn test_create_account() {
        let tx = Transaction::create_account(1, alice(), 500, 0, 1_000).unwrap();
        assert!(tx.to.is_none());
        assert_eq!(
            tx.extra_data().unwrap().contract_method().unwrap(),
            ContractMethod::CreateAccount
        );
    }

    #[test]
    fn test_unknown_method() {
        let extra = ExtraData {
            method: "mint".to_string(),
            chain_height: 0,
        };
        assert_eq!(
            extra.contract_method(),
            Err(TypesError::UnknownMethod("mint".to_string()))
        );
    }

    #[test]
    fn test_signing_hash_covers_fields() {
        let tx = Transaction::transfer(1, alice(), bob(), 0, 100, 7, 1_000).unwrap();
        let mut other = tx.clone();
        other.value = 101;
        assert_ne!(tx.signing_hash(), other.signing_hash());
        assert_eq!(tx.signing_hash(), tx.clone().signing_hash());
    }

    #[test]
    fn test_signed_transaction_hash() {
        let tx = Transaction::transfer(1, alice(), bob(), 0, 100, 7, 1_000).unwrap();
        let signed = SignedTransaction::new(
            tx,
            Ed25519Signature::from_bytes([1u8; 64]),
            Ed25519PublicKey::from_bytes([2u8; 32]),
        );
        assert!(!signed.hash().is_zero());
        assert_eq!(signed.claimed_sender(), alice());
        assert!(!signed.is_create());
    }
}
