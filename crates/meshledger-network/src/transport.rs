//! Peer transport: sessions, gossip relay, proposal exchange and chain-sync serving.

use crate::epoch::{now_ms, EpochClock};
use crate::error::NetworkError;
use crate::mesh::{Mesh, MeshEvent};
use crate::message::PeerMessage;
use crate::send_buffer::SendBuffer;
use crate::session::{DiscoveryState, SessionManager};
use crate::sync_client::SyncClient;
use bytes::Bytes;
use meshledger_consensus::{ConsensusError, LedgerEvent, Orchestrator, PipelineReport};
use meshledger_types::{BlockHeader, PeerId, SignedTransaction};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum concurrent peer sessions; discovery pauses at the bound
    pub max_sessions: usize,
    /// Gossip flush period, aligned to wall-clock multiples
    pub gossip_epoch: Duration,
    /// Consensus round period, aligned to wall-clock multiples
    pub round_epoch: Duration,
    /// How long a round collects proposals before assembling
    pub proposal_window: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_sessions: 8,
            gossip_epoch: Duration::from_secs(30),
            round_epoch: Duration::from_secs(60),
            proposal_window: Duration::from_secs(10),
        }
    }
}

pub struct PeerTransport {
    config: TransportConfig,
    mesh: Arc<dyn Mesh>,
    orchestrator: Arc<Orchestrator>,
    sync: Arc<SyncClient>,
    sessions: Mutex<SessionManager>,
    send_buffer: Mutex<SendBuffer>,
    /// Discovery state last applied to the mesh
    discovery: tokio::sync::Mutex<DiscoveryState>,
}

impl PeerTransport {
    /// `sync` must be the same client the orchestrator was built with, so that sync
    /// responses arriving here reach the orchestrator's pending requests.
    pub fn new(
        config: TransportConfig,
        mesh: Arc<dyn Mesh>,
        orchestrator: Arc<Orchestrator>,
        sync: Arc<SyncClient>,
    ) -> Self {
        let sessions = SessionManager::new(config.max_sessions);
        Self {
            config,
            mesh,
            orchestrator,
            sync,
            sessions: Mutex::new(sessions),
            send_buffer: Mutex::new(SendBuffer::new()),
            discovery: tokio::sync::Mutex::new(DiscoveryState::Suspended),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn local_id(&self) -> PeerId {
        self.mesh.local_id()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.sessions.lock().peers()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn discovery_state(&self) -> DiscoveryState {
        self.sessions.lock().discovery_state()
    }

    /// Records waiting for the next gossip tick.
    pub fn pending_gossip(&self) -> usize {
        self.send_buffer.lock().len()
    }

    /// Validate a locally created transaction and queue it for gossip.
    pub async fn submit_local(&self, tx: &SignedTransaction, cancel: &CancellationToken) -> PipelineReport {
        let report = self.orchestrator.submit_transaction(tx, cancel).await;
        if report.is_applied() {
            match self.orchestrator.codec().encode_transaction(tx) {
                Ok(record) => {
                    self.send_buffer.lock().push(record);
                }
                Err(e) => warn!(error = %e, "Could not queue transaction for gossip"),
            }
        }
        report
    }

    /// Bring discovery in line with the session count.
    pub async fn update_discovery(&self) {
        let target = self.discovery_state();
        let mut applied = self.discovery.lock().await;
        if *applied == target {
            return;
        }
        match target {
            DiscoveryState::Suspended => {
                self.mesh.stop_advertising().await;
                self.mesh.stop_browsing().await;
                info!(sessions = self.session_count(), "Session limit reached, discovery suspended");
            }
            DiscoveryState::Discoverable => {
                self.mesh.start_advertising().await;
                self.mesh.start_browsing().await;
                info!(sessions = self.session_count(), "Discovery active");
            }
        }
        *applied = target;
    }

    pub async fn handle_event(self: &Arc<Self>, event: MeshEvent, cancel: &CancellationToken) {
        match event {
            MeshEvent::Connected(peer) => self.on_connected(peer).await,
            MeshEvent::Disconnected(peer) => self.on_disconnected(peer).await,
            MeshEvent::Frame { from, payload } => self.on_frame(from, payload, cancel),
        }
    }

    async fn on_connected(&self, peer: PeerId) {
        let admitted = self.sessions.lock().admit(peer.clone());
        match admitted {
            Ok(true) => {
                info!(peer = %peer, sessions = self.session_count(), "Session admitted");
                self.orchestrator.publish(LedgerEvent::PeerConnected(peer));
            }
            Ok(false) => {}
            Err(e) => {
                warn!(peer = %peer, error = %e, "Refusing session");
                self.mesh.disconnect(&peer).await;
            }
        }
        self.update_discovery().await;
    }

    async fn on_disconnected(&self, peer: PeerId) {
        let closed = self.sessions.lock().remove(&peer);
        if let Some(session) = closed {
            info!(
                peer = %peer,
                duration_secs = session.connected_at.elapsed().as_secs(),
                "Session closed"
            );
            self.orchestrator.publish(LedgerEvent::PeerDisconnected(peer));
        }
        self.update_discovery().await;
    }

    /// Decode a frame and dispatch it. Sync responses are resolved inline; everything else
    /// runs on its own task so a pipeline waiting on chain sync never stalls the event
    /// loop that delivers the sync response.
    fn on_frame(self: &Arc<Self>, from: PeerId, payload: Bytes, cancel: &CancellationToken) {
        if !self.sessions.lock().contains(&from) {
            debug!(peer = %from, "Dropping frame from peer without a session");
            return;
        }
        let message = match PeerMessage::from_frame(self.orchestrator.codec().as_ref(), &payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(peer = %from, size = payload.len(), error = %e, "Dropping undecodable frame");
                return;
            }
        };
        debug!(peer = %from, kind = message.kind(), "Frame received");

        if let PeerMessage::SyncResponse { request_id, blocks } = message {
            self.sync.resolve(&from, request_id, blocks);
            return;
        }

        let this = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::spawn(async move { this.dispatch(from, message, &cancel).await });
    }

    async fn dispatch(&self, from: PeerId, message: PeerMessage, cancel: &CancellationToken) {
        match message {
            PeerMessage::Transactions(records) => {
                self.receive_transactions(&from, records, cancel).await;
            }
            PeerMessage::Proposal(encoded) => self.receive_proposal(&from, &encoded, cancel).await,
            PeerMessage::SyncRequest { request_id, from_number } => {
                self.serve_sync(&from, request_id, from_number).await;
            }
            PeerMessage::BlockPush { blocks } => {
                match self.orchestrator.import_blocks(blocks, cancel).await {
                    Ok(imported) => debug!(peer = %from, imported, "Block push applied"),
                    Err(e) => warn!(peer = %from, error = %e, "Block push rejected"),
                }
            }
            PeerMessage::SyncResponse { .. } => {}
        }
    }

    /// Run a gossip batch through the pipeline. Records that fail are skipped; the rest
    /// of the batch still applies. Applied records are queued for relay. Returns how many
    /// were applied.
    pub async fn receive_transactions(
        &self,
        from: &PeerId,
        records: Vec<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> usize {
        let received = records.len();
        let mut applied = 0;

        for record in records {
            let report = self.orchestrator.submit(&record, Some(from), cancel).await;
            if report.is_applied() {
                applied += 1;
                self.send_buffer.lock().push(record);
            } else if matches!(report.error(), Some(ConsensusError::Cancelled)) {
                break;
            }
        }

        debug!(peer = %from, received, applied, "Gossip batch processed");
        applied
    }

    async fn receive_proposal(&self, from: &PeerId, encoded: &[u8], cancel: &CancellationToken) {
        let block = match self.orchestrator.codec().decode_block(encoded) {
            Ok(block) => block,
            Err(e) => {
                warn!(peer = %from, error = %e, "Dropping undecodable proposal");
                return;
            }
        };
        let height = match self.orchestrator.chain_height().await {
            Ok(height) => height,
            Err(e) => {
                warn!(error = %e, "Could not read chain height");
                return;
            }
        };

        if block.number() < height {
            debug!(peer = %from, number = block.number(), height, "Ignoring stale proposal");
            return;
        }
        if block.number() > height {
            self.orchestrator.publish(LedgerEvent::SyncRequired {
                peer: from.clone(),
                local: height,
                advertised: block.number(),
            });
            match self.orchestrator.catch_up(from, cancel).await {
                Ok(caught_up) if caught_up == block.number() => {}
                Ok(caught_up) => {
                    warn!(peer = %from, height = caught_up, number = block.number(), "Proposal still out of reach after sync");
                    return;
                }
                Err(e) => {
                    warn!(peer = %from, error = %e, "Catch-up for proposal failed");
                    return;
                }
            }
        }

        let number = block.number();
        if self.orchestrator.add_proposal(block).await {
            debug!(peer = %from, number, "Proposal recorded");
        }
    }

    async fn serve_sync(&self, peer: &PeerId, request_id: u64, from_number: u64) {
        let blocks = match self.orchestrator.blocks_since(from_number).await {
            Ok(blocks) => blocks,
            Err(e) => {
                // Answer anyway so the requester does not sit out its timeout
                warn!(peer = %peer, error = %e, "Could not read blocks for sync request");
                Vec::new()
            }
        };
        debug!(peer = %peer, request_id, from_number, count = blocks.len(), "Serving sync request");
        if let Err(e) = self.send(peer, &PeerMessage::SyncResponse { request_id, blocks }).await {
            warn!(peer = %peer, error = %e, "Sync response failed");
        }
    }

    async fn send(&self, peer: &PeerId, message: &PeerMessage) -> Result<(), NetworkError> {
        let frame = message.to_frame(self.orchestrator.codec().as_ref())?;
        self.mesh.send(peer, frame).await
    }

    /// Send one message to every session. Returns how many peers it reached.
    pub async fn broadcast(&self, message: &PeerMessage) -> Result<usize, NetworkError> {
        let frame = message.to_frame(self.orchestrator.codec().as_ref())?;
        let peers = self.peers();
        let mut delivered = 0;
        for peer in &peers {
            match self.mesh.send(peer, frame.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(peer = %peer, kind = message.kind(), error = %e, "Broadcast send failed"),
            }
        }
        Ok(delivered)
    }

    /// Broadcast the send buffer as one frame and clear it. Returns the number of records
    /// flushed; an empty buffer sends nothing.
    pub async fn flush_gossip(&self) -> Result<usize, NetworkError> {
        let records = self.send_buffer.lock().drain();
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();
        let delivered = self.broadcast(&PeerMessage::Transactions(records)).await?;
        debug!(records = count, peers = delivered, "Gossip flushed");
        Ok(count)
    }

    /// One consensus round: propose and broadcast, collect proposals for the window,
    /// then assemble.
    pub async fn run_round(
        &self,
        timestamp: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<BlockHeader>, NetworkError> {
        let proposal = self.orchestrator.propose(timestamp, cancel).await?;
        let encoded = self.orchestrator.codec().encode_block(&proposal)?;
        self.broadcast(&PeerMessage::Proposal(encoded)).await?;

        tokio::select! {
            _ = cancel.cancelled() => return Err(ConsensusError::Cancelled.into()),
            _ = sleep(self.config.proposal_window) => {}
        }
        Ok(self.orchestrator.assemble_block(cancel).await?)
    }

    /// Drive the transport until cancelled: mesh events, the gossip tick and the round
    /// tick, the latter two aligned to wall-clock epochs.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), NetworkError> {
        let mut events = self.mesh.events().await?;
        let gossip = EpochClock::new(self.config.gossip_epoch);
        let rounds = EpochClock::new(self.config.round_epoch);

        self.update_discovery().await;
        info!(
            id = %self.local_id(),
            max_sessions = self.config.max_sessions,
            gossip_epoch_ms = gossip.period().as_millis() as u64,
            round_epoch_ms = rounds.period().as_millis() as u64,
            "Peer transport running"
        );

        let mut gossip_due = gossip.next_boundary(now_ms());
        let mut round_due = rounds.next_boundary(now_ms());
        let gossip_tick = sleep(until(gossip_due));
        let round_tick = sleep(until(round_due));
        tokio::pin!(gossip_tick, round_tick);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event, &cancel).await,
                    None => {
                        warn!("Mesh event stream closed");
                        break;
                    }
                },
                _ = &mut gossip_tick => {
                    if let Err(e) = self.flush_gossip().await {
                        warn!(error = %e, "Gossip flush failed");
                    }
                    gossip_due = gossip.following(gossip_due);
                    gossip_tick.as_mut().reset(Instant::now() + until(gossip_due));
                }
                _ = &mut round_tick => {
                    let timestamp = round_due;
                    let this = Arc::clone(&self);
                    let round_cancel = cancel.clone();
                    tokio::spawn(async move {
                        match this.run_round(timestamp, &round_cancel).await {
                            Ok(Some(header)) => debug!(number = header.number, "Round committed a block"),
                            Ok(None) => debug!(timestamp, "Round skipped"),
                            Err(e) => warn!(timestamp, error = %e, "Round failed"),
                        }
                    });
                    round_due = rounds.following(round_due);
                    round_tick.as_mut().reset(Instant::now() + until(round_due));
                }
            }
        }

        self.mesh.stop_advertising().await;
        self.mesh.stop_browsing().await;
        info!(id = %self.local_id(), "Peer transport stopped");
        Ok(())
    }
}

fn until(boundary_ms: u64) -> Duration {
    Duration::from_millis(boundary_ms.saturating_sub(now_ms()))
}
