use crate::error::CryptoError;
use ed25519_dalek::{Signer as _, Verifier};
use meshledger_types::{Address, Ed25519PublicKey, Ed25519Signature, SignedTransaction, Transaction};
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroize;

/// Ed25519 signing credentials. The address is derived from the verifying key, so a
/// keypair is also an account identity.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Seed bytes as read back from a key file.
    pub fn from_seed_slice(seed: &[u8]) -> Result<Self, CryptoError> {
        let mut bytes: [u8; 32] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidSeedLength(seed.len()))?;
        let keypair = Self::from_seed(&bytes);
        bytes.zeroize();
        Ok(keypair)
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    pub fn address(&self) -> Address {
        self.public_key().to_address()
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature::from_bytes(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a transaction over its signing hash.
    pub fn sign_transaction(&self, tx: Transaction) -> SignedTransaction {
        let signature = self.sign(tx.signing_hash().as_bytes());
        SignedTransaction::new(tx, signature, self.public_key())
    }

    /// Secret seed; the node writes it to its key file.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        let mut bytes = self.to_bytes();
        let keypair = Self::from_seed(&bytes);
        bytes.zeroize();
        keypair
    }
}

pub fn verify(
    public_key: &Ed25519PublicKey,
    message: &[u8],
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    ed25519_dalek::VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| CryptoError::InvalidPublicKey)?
        .verify(message, &ed25519_dalek::Signature::from_bytes(signature.as_bytes()))
        .map_err(|_| CryptoError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_determines_identity() {
        let kp1 = Keypair::from_seed(&[42u8; 32]);
        let kp2 = Keypair::from_seed(&[42u8; 32]);
        assert_eq!(kp1.address(), kp2.address());
        assert_eq!(kp1.to_bytes(), [42u8; 32]);
        assert!(!Keypair::generate().public_key().is_zero());
    }

    #[test]
    fn test_from_seed_slice_rejects_short_seed() {
        assert_eq!(
            Keypair::from_seed_slice(&[1u8; 16]).unwrap_err(),
            CryptoError::InvalidSeedLength(16)
        );
        assert!(Keypair::from_seed_slice(&[1u8; 32]).is_ok());
    }

    #[test]
    fn test_verify_checks_message_and_key() {
        let keypair = Keypair::from_seed(&[1u8; 32]);
        let signature = keypair.sign(b"hello mesh");
        assert!(verify(&keypair.public_key(), b"hello mesh", &signature).is_ok());
        assert_eq!(
            verify(&keypair.public_key(), b"other", &signature),
            Err(CryptoError::VerificationFailed)
        );
        let stranger = Keypair::from_seed(&[2u8; 32]);
        assert!(verify(&stranger.public_key(), b"hello mesh", &signature).is_err());
    }

    #[test]
    fn test_sign_transaction() {
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let tx = Transaction::create_account(1, keypair.address(), 100, 0, 1).unwrap();
        let signed = keypair.sign_transaction(tx.clone());

        assert_eq!(signed.tx, tx);
        assert_eq!(signed.public_key, keypair.public_key());
        assert!(verify(&signed.public_key, tx.signing_hash().as_bytes(), &signed.signature).is_ok());
    }

    #[test]
    fn test_clone_preserves_key() {
        let keypair = Keypair::generate();
        assert_eq!(keypair.clone().public_key(), keypair.public_key());
    }
}
