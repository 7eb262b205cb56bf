//! Chain-sync collaborator used when a peer is ahead of or behind the local tip.

use crate::error::ConsensusError;
use async_trait::async_trait;
use meshledger_types::{Block, PeerId};

#[async_trait]
pub trait ChainSync: Send + Sync {
    /// Ask `peer` for its blocks numbered `from_number` and up, and wait for the answer.
    async fn request_blocks(&self, peer: &PeerId, from_number: u64) -> Result<Vec<Block>, ConsensusError>;

    /// Send blocks to `peer` without waiting for a reply.
    async fn push_blocks(&self, peer: &PeerId, blocks: Vec<Block>) -> Result<(), ConsensusError>;
}

/// Sync for a node without peers: requests fail, pushes go nowhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSync;

#[async_trait]
impl ChainSync for NoSync {
    async fn request_blocks(&self, peer: &PeerId, _from_number: u64) -> Result<Vec<Block>, ConsensusError> {
        Err(ConsensusError::Network(format!("no route to {}", peer)))
    }

    async fn push_blocks(&self, _peer: &PeerId, _blocks: Vec<Block>) -> Result<(), ConsensusError> {
        Ok(())
    }
}
