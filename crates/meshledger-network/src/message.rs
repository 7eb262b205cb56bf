//! Wire messages exchanged between peers.
//!
//! Every frame on the mesh is `compress(borsh(PeerMessage))`. The format carries no
//! version field; peers must run compatible builds.

use crate::error::NetworkError;
use borsh::{BorshDeserialize, BorshSerialize};
use bytes::Bytes;
use meshledger_storage::Codec;
use meshledger_types::Block;

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum PeerMessage {
    /// Gossip batch; each record is one independently encoded transaction
    Transactions(Vec<Vec<u8>>),
    /// A peer's block proposal for the current round, codec-encoded
    Proposal(Vec<u8>),
    /// Ask for committed blocks numbered `from_number` and up
    SyncRequest { request_id: u64, from_number: u64 },
    SyncResponse { request_id: u64, blocks: Vec<Block> },
    /// Unsolicited blocks for a peer that advertised a lower height
    BlockPush { blocks: Vec<Block> },
}

impl PeerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Transactions(_) => "transactions",
            PeerMessage::Proposal(_) => "proposal",
            PeerMessage::SyncRequest { .. } => "sync_request",
            PeerMessage::SyncResponse { .. } => "sync_response",
            PeerMessage::BlockPush { .. } => "block_push",
        }
    }

    /// Serialize and compress into one wire frame.
    pub fn to_frame(&self, codec: &dyn Codec) -> Result<Bytes, NetworkError> {
        let raw = borsh::to_vec(self).map_err(|e| NetworkError::Frame(e.to_string()))?;
        Ok(Bytes::from(codec.compress(&raw)?))
    }

    /// Decompress and decode a wire frame. Any failure rejects the whole frame.
    pub fn from_frame(codec: &dyn Codec, frame: &[u8]) -> Result<Self, NetworkError> {
        let raw = codec.decompress(frame)?;
        borsh::from_slice(&raw).map_err(|e| NetworkError::Frame(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshledger_storage::BorshZstdCodec;
    use meshledger_types::Address;

    #[test]
    fn test_frame_carries_batch() {
        let codec = BorshZstdCodec::default();
        let msg = PeerMessage::Transactions(vec![vec![1, 2, 3], vec![], vec![0xFF; 64]]);
        let frame = msg.to_frame(&codec).unwrap();
        assert_eq!(PeerMessage::from_frame(&codec, &frame).unwrap(), msg);
    }

    #[test]
    fn test_sync_response_with_blocks() {
        let codec = BorshZstdCodec::default();
        let genesis = Block::proposal(None, Address::from_bytes([1u8; 20]), 0);
        let next = Block::proposal(Some(&genesis.header), Address::from_bytes([1u8; 20]), 1);
        let msg = PeerMessage::SyncResponse { request_id: 9, blocks: vec![genesis, next] };
        let frame = msg.to_frame(&codec).unwrap();
        assert_eq!(PeerMessage::from_frame(&codec, &frame).unwrap(), msg);
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let codec = BorshZstdCodec::default().with_max_decompressed(4096);
        let msg = PeerMessage::Proposal(vec![0u8; 64 * 1024]);
        let frame = msg.to_frame(&codec).unwrap();
        assert!(frame.len() < 4096);
        assert!(matches!(
            PeerMessage::from_frame(&codec, &frame),
            Err(NetworkError::Storage(_))
        ));
    }

    #[test]
    fn test_uncompressed_frame_is_rejected() {
        let codec = BorshZstdCodec::default();
        let raw = borsh::to_vec(&PeerMessage::Proposal(vec![1])).unwrap();
        assert!(PeerMessage::from_frame(&codec, &raw).is_err());
    }

    #[test]
    fn test_truncated_message_is_rejected() {
        let codec = BorshZstdCodec::default();
        let raw = borsh::to_vec(&PeerMessage::SyncRequest { request_id: 1, from_number: 2 }).unwrap();
        let frame = codec.compress(&raw[..raw.len() - 3]).unwrap();
        assert!(matches!(
            PeerMessage::from_frame(&codec, &frame),
            Err(NetworkError::Frame(_))
        ));
    }
}
