//! In-memory mesh for tests and single-process simulation.
//!
//! Every [`LocalMesh`] joins a shared [`LocalHub`]. Discovery follows the same rules as a
//! radio mesh: a browsing device connects to every advertising device it can see, and
//! frames are routed through the hub's registry over async channels.

use crate::error::NetworkError;
use crate::mesh::{Mesh, MeshEvent};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use meshledger_types::PeerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::Mutex;
use tracing::debug;

const EVENT_CAPACITY: usize = 1024;

/// Registry of every device on the simulated mesh.
#[derive(Default)]
pub struct LocalHub {
    nodes: DashMap<PeerId, Arc<LocalMesh>>,
}

impl LocalHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a device. Joining twice with one id replaces the earlier device.
    pub fn join(self: &Arc<Self>, id: impl Into<PeerId>) -> Arc<LocalMesh> {
        let (tx, rx) = channel(EVENT_CAPACITY);
        let mesh = Arc::new(LocalMesh {
            id: id.into(),
            hub: Arc::downgrade(self),
            links: DashSet::new(),
            advertising: AtomicBool::new(false),
            browsing: AtomicBool::new(false),
            tx,
            rx: Mutex::new(Some(rx)),
        });
        self.nodes.insert(mesh.id.clone(), Arc::clone(&mesh));
        mesh
    }

    /// Remove a device, closing all of its connections.
    pub async fn leave(&self, id: &PeerId) {
        if let Some((_, mesh)) = self.nodes.remove(id) {
            for peer in mesh.peers() {
                mesh.disconnect(&peer).await;
            }
        }
    }

    fn node(&self, id: &PeerId) -> Option<Arc<LocalMesh>> {
        self.nodes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn others(&self, id: &PeerId) -> Vec<Arc<LocalMesh>> {
        self.nodes
            .iter()
            .filter(|entry| entry.key() != id)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

pub struct LocalMesh {
    id: PeerId,
    hub: Weak<LocalHub>,
    links: DashSet<PeerId>,
    advertising: AtomicBool,
    browsing: AtomicBool,
    tx: Sender<MeshEvent>,
    rx: Mutex<Option<Receiver<MeshEvent>>>,
}

impl LocalMesh {
    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::SeqCst)
    }

    pub fn is_browsing(&self) -> bool {
        self.browsing.load(Ordering::SeqCst)
    }

    async fn link(a: &LocalMesh, b: &LocalMesh) {
        if a.id == b.id || !a.links.insert(b.id.clone()) {
            return;
        }
        b.links.insert(a.id.clone());
        let _ = a.tx.send(MeshEvent::Connected(b.id.clone())).await;
        let _ = b.tx.send(MeshEvent::Connected(a.id.clone())).await;
        debug!(a = %a.id, b = %b.id, "Local mesh link up");
    }

    /// Connect to every advertising device when browsing, and every browsing device
    /// when advertising.
    async fn discover(&self) {
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        for other in hub.others(&self.id) {
            let matched = (self.is_browsing() && other.is_advertising())
                || (self.is_advertising() && other.is_browsing());
            if matched {
                Self::link(self, &other).await;
            }
        }
    }
}

#[async_trait]
impl Mesh for LocalMesh {
    fn local_id(&self) -> PeerId {
        self.id.clone()
    }

    async fn start_advertising(&self) {
        self.advertising.store(true, Ordering::SeqCst);
        self.discover().await;
    }

    async fn stop_advertising(&self) {
        self.advertising.store(false, Ordering::SeqCst);
    }

    async fn start_browsing(&self) {
        self.browsing.store(true, Ordering::SeqCst);
        self.discover().await;
    }

    async fn stop_browsing(&self) {
        self.browsing.store(false, Ordering::SeqCst);
    }

    async fn send(&self, peer: &PeerId, frame: Bytes) -> Result<(), NetworkError> {
        if !self.links.contains(peer) {
            return Err(NetworkError::PeerNotFound(peer.clone()));
        }
        let target = self
            .hub
            .upgrade()
            .and_then(|hub| hub.node(peer))
            .ok_or_else(|| NetworkError::PeerNotFound(peer.clone()))?;

        target
            .tx
            .send(MeshEvent::Frame {
                from: self.id.clone(),
                payload: frame,
            })
            .await
            .map_err(|e| NetworkError::SendFailed {
                peer: peer.clone(),
                reason: e.to_string(),
            })
    }

    async fn disconnect(&self, peer: &PeerId) {
        if self.links.remove(peer).is_none() {
            return;
        }
        let _ = self.tx.send(MeshEvent::Disconnected(peer.clone())).await;

        if let Some(other) = self.hub.upgrade().and_then(|hub| hub.node(peer)) {
            if other.links.remove(&self.id).is_some() {
                let _ = other.tx.send(MeshEvent::Disconnected(self.id.clone())).await;
            }
        }
        debug!(a = %self.id, b = %peer, "Local mesh link down");
    }

    fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.links.iter().map(|p| p.key().clone()).collect();
        peers.sort();
        peers
    }

    async fn events(&self) -> Result<Receiver<MeshEvent>, NetworkError> {
        self.rx.lock().await.take().ok_or(NetworkError::EventsTaken)
    }
}
