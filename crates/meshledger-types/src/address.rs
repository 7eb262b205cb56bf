use crate::error::TypesError;
use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt;
use std::str::FromStr;

/// Account address: the first 20 bytes of `blake3(ed25519_pubkey)`.
///
/// Displays as `0x`-prefixed hex. [`Address::to_bech32`] gives the `mesh1...` form shown to
/// users; both parse back.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BorshSerialize, BorshDeserialize,
)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);
    pub const LEN: usize = 20;

    /// Human-readable part of the bech32m form
    pub const HRP: &'static str = "mesh";

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        let bytes: [u8; 20] = slice
            .try_into()
            .map_err(|_| TypesError::InvalidAddressLength(slice.len()))?;
        Ok(Self(bytes))
    }

    pub fn from_public_key(pubkey: &[u8; 32]) -> Self {
        let digest = blake3::hash(pubkey);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..Self::LEN]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn to_bech32(&self) -> String {
        let hrp = bech32::Hrp::parse_unchecked(Self::HRP);
        // Encoding 20 bytes under a fixed short prefix cannot exceed the length limit
        bech32::encode::<bech32::Bech32m>(hrp, &self.0).unwrap_or_default()
    }

    fn from_bech32(s: &str) -> Result<Self, TypesError> {
        let (hrp, data) = bech32::decode(s).map_err(|e| TypesError::Bech32Error(e.to_string()))?;
        if hrp.as_str() != Self::HRP {
            return Err(TypesError::InvalidAddressFormat(format!("unexpected prefix '{}'", hrp)));
        }
        Self::from_slice(&data)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(digits) = s.strip_prefix("0x") {
            Self::from_slice(&hex::decode(digits)?)
        } else if s.starts_with("mesh1") {
            Self::from_bech32(s)
        } else {
            Err(TypesError::InvalidAddressFormat(s.to_string()))
        }
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
