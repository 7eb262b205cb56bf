//! Consensus orchestrator: the transaction pipeline and the round state it guards.

use crate::error::ConsensusError;
use crate::events::LedgerEvent;
use crate::execution::{execute, is_nonce_gap};
use crate::pipeline::PipelineReport;
use crate::proposal_pool::BlockProposalPool;
use crate::sync::ChainSync;
use crate::validated_pool::{ValidatedPool, ValidatedTx};
use meshledger_crypto::Signer;
use meshledger_storage::{Codec, DurableStore, LedgerRoots, LedgerStore};
use meshledger_types::{Account, Address, Block, Hash, PeerId, SignedTransaction};
use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Chain ID (replay protection)
    pub chain_id: u64,
    /// Address credited as miner in local proposals
    pub miner: Address,
    /// Upper bound on a chain-sync round trip
    pub sync_timeout: Duration,
    /// Capacity of the ledger event channel
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            miner: Address::ZERO,
            sync_timeout: Duration::from_secs(10),
            event_capacity: 256,
        }
    }
}

/// Everything the orchestrator mutates. Lives behind one lock.
#[derive(Debug, Default)]
pub(crate) struct ConsensusState {
    pub(crate) ledger: LedgerStore,
    pub(crate) validated: ValidatedPool,
    pub(crate) proposals: BlockProposalPool,
}

impl ConsensusState {
    fn check_fresh(&self, fingerprint: &Hash) -> Result<(), ConsensusError> {
        if self.ledger.contains_transaction(fingerprint) || self.validated.contains(fingerprint) {
            return Err(ConsensusError::Duplicate(fingerprint.to_string()));
        }
        Ok(())
    }
}

/// One node's consensus engine, built from injected collaborators.
pub struct Orchestrator {
    pub(crate) config: OrchestratorConfig,
    pub(crate) store: Arc<dyn DurableStore>,
    pub(crate) signer: Arc<dyn Signer>,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) sync: Arc<dyn ChainSync>,
    pub(crate) state: Mutex<ConsensusState>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn DurableStore>,
        signer: Arc<dyn Signer>,
        codec: Arc<dyn Codec>,
        sync: Arc<dyn ChainSync>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            store,
            signer,
            codec,
            sync,
            state: Mutex::new(ConsensusState::default()),
            events,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn publish(&self, event: LedgerEvent) {
        let _ = self.events.send(event);
    }

    /// Rebuild the ledgers from every block in the durable store.
    pub async fn restore(&self) -> Result<u64, ConsensusError> {
        let blocks = self.store.blocks_from(0).await?;
        let mut ledger = LedgerStore::new();
        for block in &blocks {
            self.replay_block(&mut ledger, block)?;
        }

        let mut state = self.state.lock().await;
        state.ledger = ledger;
        state.validated.clear();
        info!(blocks = blocks.len(), "Ledger restored from store");
        Ok(blocks.len() as u64)
    }

    /// Number of committed blocks; the height advertised in outgoing transactions.
    pub async fn chain_height(&self) -> Result<u64, ConsensusError> {
        Ok(height_of(self.store.latest_block().await?.as_ref()))
    }

    pub async fn tip(&self) -> Result<Option<Block>, ConsensusError> {
        Ok(self.store.latest_block().await?)
    }

    /// Committed blocks numbered `number` and up, for peers that are behind.
    pub async fn blocks_since(&self, number: u64) -> Result<Vec<Block>, ConsensusError> {
        Ok(self.store.blocks_from(number).await?)
    }

    pub async fn ledger_roots(&self) -> LedgerRoots {
        self.state.lock().await.ledger.roots()
    }

    /// Committed account snapshot.
    pub async fn account(&self, address: &Address) -> Result<Option<Account>, ConsensusError> {
        Ok(self.state.lock().await.ledger.account(address)?)
    }

    /// Account as the next transaction would see it, pending transactions included.
    pub async fn projected_account(&self, address: &Address) -> Result<Option<Account>, ConsensusError> {
        let state = self.state.lock().await;
        state.validated.lookup(&state.ledger, address)
    }

    pub async fn validated_count(&self) -> usize {
        self.state.lock().await.validated.len()
    }

    pub async fn proposal_count(&self) -> usize {
        self.state.lock().await.proposals.len()
    }

    /// Encode and run a locally created transaction through the pipeline.
    pub async fn submit_transaction(
        &self,
        tx: &SignedTransaction,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        match self.codec.encode_transaction(tx) {
            Ok(payload) => self.submit(&payload, None, cancel).await,
            Err(e) => {
                let mut report = PipelineReport::new();
                report.fail(ConsensusError::Decoding(e.to_string()));
                report
            }
        }
    }

    /// Run one encoded transaction through the validation pipeline. `origin` is the peer
    /// it came from, used for chain sync; `None` for local submissions.
    pub async fn submit(
        &self,
        payload: &[u8],
        origin: Option<&PeerId>,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        let mut report = PipelineReport::new();
        match self.run_pipeline(payload, origin, cancel, &mut report).await {
            Ok(()) => {
                report.advance();
                debug!(
                    fingerprint = ?report.fingerprint,
                    sender = ?report.sender,
                    "Transaction validated"
                );
            }
            Err(e) => {
                debug!(
                    stage = ?report.stage(),
                    fingerprint = ?report.fingerprint,
                    error = %e,
                    "Transaction rejected"
                );
                report.fail(e);
            }
        }
        report
    }

    async fn run_pipeline(
        &self,
        payload: &[u8],
        origin: Option<&PeerId>,
        cancel: &CancellationToken,
        report: &mut PipelineReport,
    ) -> Result<(), ConsensusError> {
        if cancel.is_cancelled() {
            return Err(ConsensusError::Cancelled);
        }

        // Received -> SignatureVerified
        let tx = self
            .codec
            .decode_transaction(payload)
            .map_err(|e| ConsensusError::Decoding(e.to_string()))?;
        report.sender = Some(self.signer.verify_sender(&tx)?);
        report.advance();

        // -> Deduplicated
        let fingerprint = self.codec.fingerprint(&tx)?;
        report.fingerprint = Some(fingerprint);
        until_cancelled(cancel, self.state.lock())
            .await?
            .check_fresh(&fingerprint)?;
        report.advance();

        // -> HeightChecked
        let advertised = tx.tx.extra_data()?.chain_height;
        self.check_height(advertised, origin, cancel).await?;
        report.advance();

        // -> Dispatched; the lock is held until the pool insert
        let mut state = until_cancelled(cancel, self.state.lock()).await?;
        state.check_fresh(&fingerprint)?;
        let touched = match execute(&tx, self.config.chain_id, |addr| {
            state.validated.lookup(&state.ledger, addr)
        }) {
            Ok(touched) => touched,
            // Ahead of the sender's projected nonce: held without projection until assembly
            Err(e) if is_nonce_gap(&e) => {
                debug!(fingerprint = %fingerprint, error = %e, "Parking transaction behind a nonce gap");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        report.advance();

        let encoded = self.codec.encode_transaction(&tx)?;
        state.validated.insert(
            ValidatedTx {
                fingerprint,
                tx,
                encoded,
            },
            touched,
        );
        Ok(())
    }

    /// Compare the sender's chain height with ours. Ahead of the sender: push it our
    /// suffix in the background. Behind: sync before dispatching.
    async fn check_height(
        &self,
        advertised: u64,
        origin: Option<&PeerId>,
        cancel: &CancellationToken,
    ) -> Result<(), ConsensusError> {
        let local = height_of(until_cancelled(cancel, self.store.latest_block()).await??.as_ref());

        match local.cmp(&advertised) {
            Ordering::Equal => Ok(()),
            Ordering::Greater => {
                if let Some(peer) = origin {
                    self.spawn_push(peer.clone(), advertised);
                }
                Ok(())
            }
            Ordering::Less => {
                let Some(peer) = origin else {
                    return Err(ConsensusError::SyncRequired { local, advertised });
                };
                info!(peer = %peer, local, advertised, "Peer is ahead, syncing");
                self.publish(LedgerEvent::SyncRequired {
                    peer: peer.clone(),
                    local,
                    advertised,
                });

                let height = self.catch_up(peer, cancel).await?;
                if height < advertised {
                    return Err(ConsensusError::SyncRequired {
                        local: height,
                        advertised,
                    });
                }
                Ok(())
            }
        }
    }

    /// Fetch and import the blocks `peer` has beyond our tip. Returns the new height.
    pub async fn catch_up(
        &self,
        peer: &PeerId,
        cancel: &CancellationToken,
    ) -> Result<u64, ConsensusError> {
        let from = height_of(until_cancelled(cancel, self.store.latest_block()).await??.as_ref());
        let timeout = self.config.sync_timeout;

        let blocks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConsensusError::Cancelled),
            result = tokio::time::timeout(timeout, self.sync.request_blocks(peer, from)) => {
                result.map_err(|_| ConsensusError::SyncTimedOut(timeout.as_millis() as u64))??
            }
        };

        let imported = self.import_blocks(blocks, cancel).await?;
        let height = self.chain_height().await?;
        debug!(peer = %peer, imported, height, "Catch-up finished");
        Ok(height)
    }

    fn spawn_push(&self, peer: PeerId, from_number: u64) {
        let store = Arc::clone(&self.store);
        let sync = Arc::clone(&self.sync);
        tokio::spawn(async move {
            match store.blocks_from(from_number).await {
                Ok(blocks) if blocks.is_empty() => {}
                Ok(blocks) => {
                    debug!(peer = %peer, from_number, count = blocks.len(), "Pushing missing blocks");
                    if let Err(e) = sync.push_blocks(&peer, blocks).await {
                        warn!(peer = %peer, error = %e, "Block push failed");
                    }
                }
                Err(e) => warn!(error = %e, "Could not read blocks for push"),
            }
        });
    }

    /// Build this node's proposal for the next block and add it to the pool.
    pub async fn propose(
        &self,
        timestamp: u64,
        cancel: &CancellationToken,
    ) -> Result<Block, ConsensusError> {
        let tip = until_cancelled(cancel, self.store.latest_block()).await??;
        let block = Block::proposal(tip.as_ref().map(|b| &b.header), self.config.miner, timestamp);
        until_cancelled(cancel, self.state.lock())
            .await?
            .proposals
            .add(block.clone());
        debug!(number = block.number(), miner = %self.config.miner, "Proposed block");
        Ok(block)
    }

    /// Absorb a proposal received from a peer. Returns `false` for a re-broadcast.
    pub async fn add_proposal(&self, block: Block) -> bool {
        self.state.lock().await.proposals.add(block)
    }
}

/// Number of committed blocks given the tip.
pub(crate) fn height_of(tip: Option<&Block>) -> u64 {
    tip.map_or(0, |b| b.number() + 1)
}

pub(crate) async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ConsensusError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ConsensusError::Cancelled),
        out = fut => Ok(out),
    }
}
