//! Binary encoding and compression for wire payloads and fingerprints.

use crate::error::StorageError;
use meshledger_types::{Block, Hash, SignedTransaction};
use std::io::Read;

/// Default zstd level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Upper bound on a decompressed payload (32 MiB)
pub const MAX_DECOMPRESSED_LEN: usize = 32 * 1024 * 1024;

/// Encode/decode plus compress/decompress.
pub trait Codec: Send + Sync {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, StorageError>;

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, StorageError>;

    fn encode_transaction(&self, tx: &SignedTransaction) -> Result<Vec<u8>, StorageError>;

    fn decode_transaction(&self, bytes: &[u8]) -> Result<SignedTransaction, StorageError>;

    fn encode_block(&self, block: &Block) -> Result<Vec<u8>, StorageError>;

    fn decode_block(&self, bytes: &[u8]) -> Result<Block, StorageError>;

    /// Content fingerprint: hash of the compressed encoding.
    fn fingerprint(&self, tx: &SignedTransaction) -> Result<Hash, StorageError> {
        let encoded = self.encode_transaction(tx)?;
        Ok(Hash::compute(&self.compress(&encoded)?))
    }
}

/// Borsh encoding with zstd compression.
#[derive(Clone, Copy, Debug)]
pub struct BorshZstdCodec {
    level: i32,
    max_decompressed: usize,
}

impl BorshZstdCodec {
    pub fn new(level: i32) -> Self {
        Self {
            level,
            max_decompressed: MAX_DECOMPRESSED_LEN,
        }
    }

    /// Override the decompressed size cap.
    pub fn with_max_decompressed(mut self, limit: usize) -> Self {
        self.max_decompressed = limit;
        self
    }
}

impl Default for BorshZstdCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

fn encode<T: borsh::BorshSerialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    borsh::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: borsh::BorshDeserialize>(bytes: &[u8]) -> Result<T, StorageError> {
    borsh::from_slice(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
}

impl Codec for BorshZstdCodec {
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
        zstd::stream::encode_all(bytes, self.level).map_err(|e| StorageError::Codec(e.to_string()))
    }

    /// Fails once the output would exceed the decompressed size cap.
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
        let decoder = zstd::stream::Decoder::new(bytes).map_err(|e| StorageError::Codec(e.to_string()))?;
        let mut out = Vec::new();
        decoder
            .take(self.max_decompressed as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| StorageError::Codec(e.to_string()))?;
        if out.len() > self.max_decompressed {
            return Err(StorageError::Codec(format!(
                "decompressed payload exceeds {} bytes",
                self.max_decompressed
            )));
        }
        Ok(out)
    }

    fn encode_transaction(&self, tx: &SignedTransaction) -> Result<Vec<u8>, StorageError> {
        encode(tx)
    }

    fn decode_transaction(&self, bytes: &[u8]) -> Result<SignedTransaction, StorageError> {
        decode(bytes)
    }

    fn encode_block(&self, block: &Block) -> Result<Vec<u8>, StorageError> {
        encode(block)
    }

    fn decode_block(&self, bytes: &[u8]) -> Result<Block, StorageError> {
        decode(bytes)
    }
}
