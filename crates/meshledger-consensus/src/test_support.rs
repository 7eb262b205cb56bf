//! Shared fixtures for orchestrator tests.

use crate::error::ConsensusError;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::pipeline::PipelineReport;
use crate::sync::{ChainSync, NoSync};
use async_trait::async_trait;
use meshledger_crypto::{Ed25519Signer, Keypair};
use meshledger_storage::{BorshZstdCodec, DurableStore, MemoryStore, SaveOutcome, StorageError};
use meshledger_types::{
    Account, Address, Block, BlockHeader, Hash, PeerId, SignedTransaction, Transaction,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const CHAIN: u64 = 7;

pub fn create(kp: &Keypair, value: u128, height: u64, timestamp: u64) -> SignedTransaction {
    kp.sign_transaction(Transaction::create_account(CHAIN, kp.address(), value, height, timestamp).unwrap())
}

pub fn transfer(
    from: &Keypair,
    to: &Keypair,
    nonce: u64,
    value: u128,
    height: u64,
    timestamp: u64,
) -> SignedTransaction {
    from.sign_transaction(
        Transaction::transfer(CHAIN, from.address(), to.address(), nonce, value, height, timestamp)
            .unwrap(),
    )
}

pub struct TestNode {
    pub store: Arc<MemoryStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl TestNode {
    pub fn new() -> Self {
        Self::with_sync(Arc::new(NoSync))
    }

    pub fn with_sync(sync: Arc<dyn ChainSync>) -> Self {
        Self::with_sync_and_timeout(sync, Duration::from_secs(5))
    }

    pub fn with_sync_and_timeout(sync: Arc<dyn ChainSync>, timeout: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(Arc::clone(&store) as Arc<dyn DurableStore>, store, sync, timeout)
    }

    /// A second orchestrator over the same durable store.
    pub fn sharing_store(other: &TestNode) -> Self {
        let store = Arc::clone(&other.store);
        Self::build(
            Arc::clone(&store) as Arc<dyn DurableStore>,
            store,
            Arc::new(NoSync),
            Duration::from_secs(5),
        )
    }

    /// A node whose block commits fail while the returned store's switch is on.
    pub fn with_failing_commits() -> (Self, Arc<FailingStore>) {
        let store = Arc::new(MemoryStore::new());
        let failing = Arc::new(FailingStore::new(Arc::clone(&store)));
        let node = Self::build(
            Arc::clone(&failing) as Arc<dyn DurableStore>,
            store,
            Arc::new(NoSync),
            Duration::from_secs(5),
        );
        (node, failing)
    }

    fn build(
        durable: Arc<dyn DurableStore>,
        store: Arc<MemoryStore>,
        sync: Arc<dyn ChainSync>,
        timeout: Duration,
    ) -> Self {
        let config = OrchestratorConfig {
            chain_id: CHAIN,
            miner: Address::from_bytes([0xAA; 20]),
            sync_timeout: timeout,
            event_capacity: 64,
        };
        let orchestrator = Orchestrator::new(
            config,
            durable,
            Arc::new(Ed25519Signer::new()),
            Arc::new(BorshZstdCodec::default()),
            sync,
        );
        Self {
            store,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub async fn submit_local(&self, tx: &SignedTransaction) -> PipelineReport {
        self.orchestrator
            .submit_transaction(tx, &CancellationToken::new())
            .await
    }

    /// Propose the next block and assemble it in one go.
    pub async fn commit_round(&self, timestamp: u64) -> Result<Option<BlockHeader>, ConsensusError> {
        let cancel = CancellationToken::new();
        self.orchestrator.propose(timestamp, &cancel).await?;
        self.orchestrator.assemble_block(&cancel).await
    }

    pub async fn build_chain(&self, blocks: u64) {
        for i in 0..blocks {
            self.commit_round(i).await.unwrap().unwrap();
        }
    }
}

/// `MemoryStore` wrapper whose `commit_block` can be switched to fail.
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    fail_commits: AtomicBool,
}

impl FailingStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_commits.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DurableStore for FailingStore {
    async fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        self.inner.save_block(block).await
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<Block>, StorageError> {
        self.inner.block_by_number(number).await
    }

    async fn block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StorageError> {
        self.inner.block_by_hash(hash).await
    }

    async fn latest_block(&self) -> Result<Option<Block>, StorageError> {
        self.inner.latest_block().await
    }

    async fn blocks_from(&self, number: u64) -> Result<Vec<Block>, StorageError> {
        self.inner.blocks_from(number).await
    }

    async fn save_account(&self, account: &Account) -> Result<(), StorageError> {
        self.inner.save_account(account).await
    }

    async fn account(&self, address: &Address) -> Result<Option<Account>, StorageError> {
        self.inner.account(address).await
    }

    async fn delete_account(&self, address: &Address) -> Result<bool, StorageError> {
        self.inner.delete_account(address).await
    }

    async fn save_accounts(&self, accounts: &[Account]) -> Result<(), StorageError> {
        self.inner.save_accounts(accounts).await
    }

    async fn save_transactions(
        &self,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError> {
        self.inner.save_transactions(transactions).await
    }

    async fn transaction(&self, fingerprint: &Hash) -> Result<Option<SignedTransaction>, StorageError> {
        self.inner.transaction(fingerprint).await
    }

    async fn commit_block(
        &self,
        block: &Block,
        transactions: &[(Hash, SignedTransaction)],
    ) -> Result<SaveOutcome, StorageError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::Io("disk full".into()));
        }
        self.inner.commit_block(block, transactions).await
    }
}

enum Mode {
    Serve(Arc<Orchestrator>),
    Hang,
}

/// `ChainSync` that answers from another orchestrator, or never answers.
pub struct ScriptedSync {
    mode: Mode,
    requests: Mutex<Vec<(PeerId, u64)>>,
    pushes: Mutex<Vec<(PeerId, Vec<u64>)>>,
}

impl ScriptedSync {
    pub fn serving(source: Arc<Orchestrator>) -> Self {
        Self::with_mode(Mode::Serve(source))
    }

    pub fn hanging() -> Self {
        Self::with_mode(Mode::Hang)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(PeerId, u64)> {
        self.requests.lock().clone()
    }

    pub fn pushes(&self) -> Vec<(PeerId, Vec<u64>)> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl ChainSync for ScriptedSync {
    async fn request_blocks(&self, peer: &PeerId, from_number: u64) -> Result<Vec<Block>, ConsensusError> {
        self.requests.lock().push((peer.clone(), from_number));
        match &self.mode {
            Mode::Serve(source) => source.blocks_since(from_number).await,
            Mode::Hang => std::future::pending().await,
        }
    }

    async fn push_blocks(&self, peer: &PeerId, blocks: Vec<Block>) -> Result<(), ConsensusError> {
        self.pushes
            .lock()
            .push((peer.clone(), blocks.iter().map(Block::number).collect()));
        Ok(())
    }
}
