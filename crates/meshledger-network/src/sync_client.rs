//! Chain sync over the mesh: request/response correlated by request id.

use crate::error::NetworkError;
use crate::mesh::Mesh;
use crate::message::PeerMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use meshledger_consensus::{ChainSync, ConsensusError};
use meshledger_storage::Codec;
use meshledger_types::{Block, PeerId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

pub struct SyncClient {
    mesh: Arc<dyn Mesh>,
    codec: Arc<dyn Codec>,
    pending: DashMap<u64, (PeerId, oneshot::Sender<Vec<Block>>)>,
    next_id: AtomicU64,
}

/// Removes the pending entry when the waiting request goes away, answered or not.
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, (PeerId, oneshot::Sender<Vec<Block>>)>,
    request_id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

impl SyncClient {
    pub fn new(mesh: Arc<dyn Mesh>, codec: Arc<dyn Codec>) -> Self {
        Self {
            mesh,
            codec,
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Hand a `SyncResponse` to its waiting request. Returns `false` for an unknown or
    /// expired request id, or a response from a peer that was not asked.
    pub fn resolve(&self, from: &PeerId, request_id: u64, blocks: Vec<Block>) -> bool {
        let Some((_, (peer, sender))) = self.pending.remove_if(&request_id, |_, (peer, _)| peer == from)
        else {
            debug!(peer = %from, request_id, "Unexpected sync response");
            return false;
        };
        debug!(peer = %peer, request_id, blocks = blocks.len(), "Sync response received");
        sender.send(blocks).is_ok()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    async fn send(&self, peer: &PeerId, message: &PeerMessage) -> Result<(), NetworkError> {
        let frame = message.to_frame(self.codec.as_ref())?;
        self.mesh.send(peer, frame).await
    }
}

#[async_trait]
impl ChainSync for SyncClient {
    async fn request_blocks(&self, peer: &PeerId, from_number: u64) -> Result<Vec<Block>, ConsensusError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, (peer.clone(), tx));
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id,
        };

        debug!(peer = %peer, request_id, from_number, "Requesting blocks");
        self.send(peer, &PeerMessage::SyncRequest { request_id, from_number })
            .await?;

        rx.await
            .map_err(|_| ConsensusError::Network(format!("sync request {} to {} dropped", request_id, peer)))
    }

    async fn push_blocks(&self, peer: &PeerId, blocks: Vec<Block>) -> Result<(), ConsensusError> {
        debug!(peer = %peer, count = blocks.len(), "Pushing blocks");
        self.send(peer, &PeerMessage::BlockPush { blocks }).await?;
        Ok(())
    }
}
