use crate::address::Address;
use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt;

macro_rules! key_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|&b| b == 0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $len])
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}..)"), hex::encode(&self.0[..8]))
            }
        }
    };
}

key_bytes!(
    /// Ed25519 signature over a transaction's signing hash.
    Ed25519Signature,
    64
);

key_bytes!(
    /// Ed25519 verifying key carried alongside each signature.
    Ed25519PublicKey,
    32
);

impl Ed25519PublicKey {
    pub fn to_address(&self) -> Address {
        Address::from_public_key(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_default() {
        assert!(Ed25519Signature::default().is_zero());
        assert!(!Ed25519Signature::from_bytes([1u8; 64]).is_zero());
        assert_eq!(Ed25519PublicKey::LEN, 32);
    }

    #[test]
    fn test_public_key_to_address() {
        let pk = Ed25519PublicKey::from_bytes([7u8; 32]);
        assert_eq!(pk.to_address(), Address::from_public_key(&[7u8; 32]));
    }

    #[test]
    fn test_debug_is_truncated() {
        let sig = Ed25519Signature::from_bytes([0xcd; 64]);
        assert_eq!(format!("{:?}", sig), "Ed25519Signature(cdcdcdcdcdcdcdcd..)");
    }
}
