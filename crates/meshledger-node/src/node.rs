//! Peer node wiring: storage, consensus and the TCP mesh transport.

use crate::config::NodeConfig;
use meshledger_consensus::{LedgerEvent, Orchestrator, PipelineReport};
use meshledger_crypto::{Ed25519Signer, Keypair};
use meshledger_network::{PeerTransport, SyncClient, TcpMesh};
use meshledger_storage::{BorshZstdCodec, Codec, DurableStore, FileStore, MemoryStore};
use meshledger_types::{PeerId, Transaction};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Node lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// One ledger peer.
pub struct MeshNode {
    pub config: NodeConfig,
    keypair: Keypair,
    mesh: Arc<TcpMesh>,
    transport: Arc<PeerTransport>,
    state: NodeState,
    shutdown: CancellationToken,
}

impl MeshNode {
    /// Open storage, restore the ledger and bind the mesh listener.
    pub async fn new(config: NodeConfig) -> anyhow::Result<Self> {
        info!(name = %config.name, "Initializing MeshLedger node");
        std::fs::create_dir_all(&config.data_dir)?;

        let keypair = load_or_create_key(&config.miner_key_path())?;
        let local_id = PeerId::new(keypair.address().to_string());

        let store: Arc<dyn DurableStore> = if config.storage.in_memory {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::open(&config.data_dir.join("ledger"))?)
        };
        let codec: Arc<dyn Codec> = Arc::new(BorshZstdCodec::new(config.storage.compression_level));

        let mesh = TcpMesh::bind(
            local_id.clone(),
            config.network.listen_addr,
            config.network.bootstrap_peers.clone(),
        )
        .await?;
        let sync = Arc::new(SyncClient::new(mesh.clone(), Arc::clone(&codec)));

        let orchestrator = Arc::new(Orchestrator::new(
            config.orchestrator_config(keypair.address()),
            store,
            Arc::new(Ed25519Signer::new()),
            codec,
            sync.clone(),
        ));
        let height = orchestrator.restore().await?;
        info!(id = %local_id, height, "Ledger restored");

        let transport = Arc::new(PeerTransport::new(
            config.transport_config(),
            mesh.clone(),
            orchestrator,
            sync,
        ));

        Ok(Self {
            config,
            keypair,
            mesh,
            transport,
            state: NodeState::Initializing,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn local_id(&self) -> PeerId {
        self.transport.local_id()
    }

    /// Token that stops the node when cancelled.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Submit a `CreateAccount` for the miner key with `value` as opening balance.
    pub async fn fund_miner(&self, value: u128) -> anyhow::Result<PipelineReport> {
        let orchestrator = self.transport.orchestrator();
        let tx = Transaction::create_account(
            orchestrator.config().chain_id,
            self.keypair.address(),
            value,
            orchestrator.chain_height().await?,
            meshledger_network::epoch::now_ms(),
        )?;
        let signed = self.keypair.sign_transaction(tx);
        Ok(self.transport.submit_local(&signed, &self.shutdown).await)
    }

    /// Run until Ctrl+C or the shutdown handle fires.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.state = NodeState::Running;
        let events = tokio::spawn(log_events(
            self.transport.orchestrator().subscribe(),
            self.shutdown.clone(),
        ));
        let transport = tokio::spawn(Arc::clone(&self.transport).run(self.shutdown.clone()));

        info!(addr = %self.mesh.listen_addr(), "Node is running. Press Ctrl+C to shut down.");
        tokio::select! {
            _ = self.shutdown.cancelled() => info!("Shutdown requested"),
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
        }

        self.state = NodeState::ShuttingDown;
        self.shutdown.cancel();
        match transport.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Transport stopped with error"),
            Err(e) => error!(error = %e, "Transport task panicked"),
        }
        let _ = events.await;
        self.mesh.shutdown();
        self.state = NodeState::Stopped;
        info!("Node stopped");
        Ok(())
    }
}

/// Log ledger events; this is what a UI would subscribe to.
async fn log_events(
    mut events: tokio::sync::broadcast::Receiver<LedgerEvent>,
    shutdown: CancellationToken,
) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(LedgerEvent::BlockCreated(header)) => info!(
                number = header.number,
                hash = %header.compute_hash(),
                miner = %header.miner,
                "Block created"
            ),
            Ok(LedgerEvent::PeerConnected(peer)) => info!(peer = %peer, "Peer connected"),
            Ok(LedgerEvent::PeerDisconnected(peer)) => info!(peer = %peer, "Peer disconnected"),
            Ok(LedgerEvent::SyncRequired { peer, local, advertised }) => {
                info!(peer = %peer, local, advertised, "Sync required")
            }
            Ok(LedgerEvent::SyncCompleted { height }) => info!(height, "Sync completed"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Read a hex seed from `path`, or generate one and write it there.
pub fn load_or_create_key(path: &Path) -> anyhow::Result<Keypair> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let seed = hex::decode(contents.trim())
            .map_err(|e| anyhow::anyhow!("Invalid key file '{}': {}", path.display(), e))?;
        return Ok(Keypair::from_seed_slice(&seed)?);
    }

    let keypair = Keypair::generate();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, hex::encode(keypair.to_bytes()))?;
    info!(path = %path.display(), address = %keypair.address().to_bech32(), "Generated miner key");
    Ok(keypair)
}
