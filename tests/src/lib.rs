//! Harness for multi-peer scenarios: peers with in-memory stores on any mesh.

use meshledger_consensus::{Orchestrator, OrchestratorConfig, PipelineReport};
use meshledger_crypto::{Ed25519Signer, Keypair};
use meshledger_network::{Mesh, PeerTransport, SyncClient, TransportConfig};
use meshledger_storage::{BorshZstdCodec, Codec, MemoryStore};
use meshledger_types::{Address, BlockHeader, PeerId, SignedTransaction, Transaction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const CHAIN_ID: u64 = 99;

/// Epochs long enough that no tick fires during a test; rounds are driven by hand.
pub fn manual_config(max_sessions: usize) -> TransportConfig {
    TransportConfig {
        max_sessions,
        gossip_epoch: Duration::from_secs(3600),
        round_epoch: Duration::from_secs(3600),
        proposal_window: Duration::from_millis(300),
    }
}

pub struct TestPeer {
    pub id: PeerId,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<PeerTransport>,
    cancel: CancellationToken,
}

impl TestPeer {
    /// Wire a peer onto `mesh` and start its transport loop.
    pub fn spawn(mesh: Arc<dyn Mesh>, miner: u8, config: TransportConfig) -> Self {
        let id = mesh.local_id();
        let codec: Arc<dyn Codec> = Arc::new(BorshZstdCodec::default());
        let sync = Arc::new(SyncClient::new(Arc::clone(&mesh), Arc::clone(&codec)));
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            OrchestratorConfig {
                chain_id: CHAIN_ID,
                miner: Address::from_bytes([miner; 20]),
                sync_timeout: Duration::from_secs(5),
                event_capacity: 256,
            },
            store.clone(),
            Arc::new(Ed25519Signer::new()),
            codec,
            sync.clone(),
        ));
        let transport = Arc::new(PeerTransport::new(config, mesh, orchestrator, sync));
        let cancel = CancellationToken::new();
        tokio::spawn(Arc::clone(&transport).run(cancel.clone()));
        Self { id, store, transport, cancel }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        self.transport.orchestrator()
    }

    pub async fn submit(&self, tx: &SignedTransaction) -> PipelineReport {
        self.transport.submit_local(tx, &self.cancel).await
    }

    pub async fn height(&self) -> u64 {
        self.orchestrator().chain_height().await.unwrap_or(0)
    }

    pub async fn validated(&self) -> usize {
        self.orchestrator().validated_count().await
    }
}

impl Drop for TestPeer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Poll `condition` until it holds, panicking after a few seconds.
pub async fn wait_for<F, Fut>(what: &str, condition: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Run one consensus round on every peer at once with a shared timestamp.
pub async fn round(peers: &[&TestPeer], timestamp: u64) -> Vec<Option<BlockHeader>> {
    let mut set = JoinSet::new();
    for (i, peer) in peers.iter().enumerate() {
        let transport = Arc::clone(&peer.transport);
        let cancel = peer.cancel.clone();
        set.spawn(async move { (i, transport.run_round(timestamp, &cancel).await) });
    }

    let mut headers = vec![None; peers.len()];
    while let Some(joined) = set.join_next().await {
        let (i, result) = joined.expect("round task panicked");
        headers[i] = result.expect("round failed");
    }
    headers
}

pub fn keypair(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32])
}

pub fn create_account(kp: &Keypair, value: u128, height: u64, timestamp: u64) -> SignedTransaction {
    let tx = Transaction::create_account(CHAIN_ID, kp.address(), value, height, timestamp)
        .expect("create account");
    kp.sign_transaction(tx)
}

pub fn transfer(
    from: &Keypair,
    to: &Keypair,
    nonce: u64,
    value: u128,
    height: u64,
    timestamp: u64,
) -> SignedTransaction {
    let tx = Transaction::transfer(CHAIN_ID, from.address(), to.address(), nonce, value, height, timestamp)
        .expect("transfer");
    from.sign_transaction(tx)
}
