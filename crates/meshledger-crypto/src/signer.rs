//! Signing collaborator consumed by the transaction pipeline.

use crate::ed25519::{verify, Keypair};
use crate::error::CryptoError;
use meshledger_types::{Address, Ed25519PublicKey, SignedTransaction, Transaction};

/// Signs transactions and recovers their signers.
pub trait Signer: Send + Sync {
    /// Sign `tx` with `credentials`.
    fn sign(&self, tx: Transaction, credentials: &Keypair) -> SignedTransaction;

    /// Public key that produced the signature on `signed`.
    fn recover_public_key(&self, signed: &SignedTransaction) -> Result<Ed25519PublicKey, CryptoError>;

    /// Address controlled by `public_key`.
    fn derive_address(&self, public_key: &Ed25519PublicKey) -> Address;

    /// Recover the signer and check it against the claimed sender.
    fn verify_sender(&self, signed: &SignedTransaction) -> Result<Address, CryptoError> {
        let public_key = self.recover_public_key(signed)?;
        let derived = self.derive_address(&public_key);
        if derived != signed.claimed_sender() {
            return Err(CryptoError::SignerMismatch {
                claimed: signed.claimed_sender().to_string(),
                derived: derived.to_string(),
            });
        }
        Ok(derived)
    }
}

/// Ed25519 signer. The key travels with the transaction, so recovery means
/// verifying the signature against the embedded key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    pub fn new() -> Self {
        Self
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, tx: Transaction, credentials: &Keypair) -> SignedTransaction {
        credentials.sign_transaction(tx)
    }

    fn recover_public_key(&self, signed: &SignedTransaction) -> Result<Ed25519PublicKey, CryptoError> {
        verify(
            &signed.public_key,
            signed.tx.signing_hash().as_bytes(),
            &signed.signature,
        )?;
        Ok(signed.public_key)
    }

    fn derive_address(&self, public_key: &Ed25519PublicKey) -> Address {
        public_key.to_address()
    }
}
