//! TCP mesh for the runnable node.
//!
//! Frames are length-prefixed (`u32` big-endian) on a single connection per peer. Each
//! side opens with a handshake frame carrying its peer id; the read half then runs in
//! its own task while the write half is kept for sends. Discovery is static: browsing
//! dials the configured bootstrap addresses, advertising accepts inbound connections.

use crate::error::NetworkError;
use crate::mesh::{Mesh, MeshEvent};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use meshledger_types::PeerId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest frame accepted from a peer
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);
const EVENT_CAPACITY: usize = 1024;

type Writer = Arc<Mutex<OwnedWriteHalf>>;

pub struct TcpMesh {
    this: Weak<TcpMesh>,
    local_id: PeerId,
    listen_addr: SocketAddr,
    bootstrap: Vec<SocketAddr>,
    writers: DashMap<PeerId, Writer>,
    /// Bootstrap address -> the peer it turned out to be
    dialed: DashMap<SocketAddr, PeerId>,
    advertising: AtomicBool,
    browsing: AtomicBool,
    tx: Sender<MeshEvent>,
    rx: Mutex<Option<Receiver<MeshEvent>>>,
    shutdown: CancellationToken,
}

impl TcpMesh {
    /// Bind the listener and start accepting. Inbound connections are refused until
    /// advertising starts.
    pub async fn bind(
        local_id: PeerId,
        addr: SocketAddr,
        bootstrap: Vec<SocketAddr>,
    ) -> Result<Arc<Self>, NetworkError> {
        let listener = TcpListener::bind(addr).await?;
        let listen_addr = listener.local_addr()?;
        let (tx, rx) = channel(EVENT_CAPACITY);

        let mesh = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            local_id,
            listen_addr,
            bootstrap,
            writers: DashMap::new(),
            dialed: DashMap::new(),
            advertising: AtomicBool::new(false),
            browsing: AtomicBool::new(false),
            tx,
            rx: Mutex::new(Some(rx)),
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Arc::clone(&mesh).accept_loop(listener));
        info!(id = %mesh.local_id, addr = %listen_addr, "TCP mesh listening");
        Ok(mesh)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::SeqCst)
    }

    /// Dial `addr` and complete the handshake.
    pub async fn connect(&self, addr: SocketAddr) -> Result<PeerId, NetworkError> {
        let stream = TcpStream::connect(addr).await?;
        let peer = self.establish(stream).await?;
        self.dialed.insert(addr, peer.clone());
        Ok(peer)
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.writers.clear();
        info!(id = %self.local_id, "TCP mesh shut down");
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if !self.advertising.load(Ordering::SeqCst) {
                            debug!(%addr, "Refusing inbound connection while not advertising");
                            continue;
                        }
                        let mesh = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(e) = mesh.establish(stream).await {
                                debug!(%addr, error = %e, "Inbound handshake failed");
                            }
                        });
                    }
                    Err(e) => debug!(error = %e, "Accept error"),
                },
            }
        }
    }

    async fn establish(&self, stream: TcpStream) -> Result<PeerId, NetworkError> {
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| NetworkError::Handshake("mesh is shutting down".to_string()))?;
        let (mut reader, mut writer) = stream.into_split();

        let hello = timeout(HANDSHAKE_TIMEOUT, async {
            write_frame(&mut writer, self.local_id.as_str().as_bytes()).await?;
            read_frame(&mut reader).await
        })
        .await
        .map_err(|_| NetworkError::Handshake("timed out".to_string()))??;

        let peer = String::from_utf8(hello)
            .map(PeerId::new)
            .map_err(|e| NetworkError::Handshake(e.to_string()))?;
        if peer == self.local_id {
            return Err(NetworkError::Handshake("connected to self".to_string()));
        }
        if self.writers.contains_key(&peer) {
            return Err(NetworkError::Handshake(format!("already connected to {}", peer)));
        }

        let writer: Writer = Arc::new(Mutex::new(writer));
        self.writers.insert(peer.clone(), Arc::clone(&writer));
        let _ = self.tx.send(MeshEvent::Connected(peer.clone())).await;
        info!(peer = %peer, "Peer connected");

        tokio::spawn(this.read_loop(peer.clone(), reader, writer));
        Ok(peer)
    }

    async fn read_loop(self: Arc<Self>, peer: PeerId, mut reader: OwnedReadHalf, writer: Writer) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                frame = read_frame(&mut reader) => match frame {
                    Ok(payload) => {
                        let event = MeshEvent::Frame { from: peer.clone(), payload: Bytes::from(payload) };
                        if self.tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(peer = %peer, error = %e, "Connection closed");
                        break;
                    }
                },
            }
        }

        // Only report our own connection; a replacement may already be registered
        if self.writers.remove_if(&peer, |_, w| Arc::ptr_eq(w, &writer)).is_some() {
            let _ = self.tx.send(MeshEvent::Disconnected(peer.clone())).await;
            info!(peer = %peer, "Peer disconnected");
        }
    }

    fn is_connected(&self, addr: &SocketAddr) -> bool {
        self.dialed
            .get(addr)
            .map_or(false, |peer| self.writers.contains_key(peer.value()))
    }
}

#[async_trait]
impl Mesh for TcpMesh {
    fn local_id(&self) -> PeerId {
        self.local_id.clone()
    }

    async fn start_advertising(&self) {
        self.advertising.store(true, Ordering::SeqCst);
    }

    async fn stop_advertising(&self) {
        self.advertising.store(false, Ordering::SeqCst);
    }

    async fn start_browsing(&self) {
        self.browsing.store(true, Ordering::SeqCst);
        for addr in &self.bootstrap {
            if !self.browsing.load(Ordering::SeqCst) {
                break;
            }
            if *addr == self.listen_addr || self.is_connected(addr) {
                continue;
            }
            match self.connect(*addr).await {
                Ok(peer) => debug!(%addr, peer = %peer, "Connected to bootstrap peer"),
                Err(e) => warn!(%addr, error = %e, "Could not reach bootstrap peer"),
            }
        }
    }

    async fn stop_browsing(&self) {
        self.browsing.store(false, Ordering::SeqCst);
    }

    async fn send(&self, peer: &PeerId, frame: Bytes) -> Result<(), NetworkError> {
        let writer = self
            .writers
            .get(peer)
            .map(|w| Arc::clone(w.value()))
            .ok_or_else(|| NetworkError::PeerNotFound(peer.clone()))?;
        let mut writer = writer.lock().await;
        write_frame(&mut *writer, &frame)
            .await
            .map_err(|e| NetworkError::SendFailed {
                peer: peer.clone(),
                reason: e.to_string(),
            })
    }

    async fn disconnect(&self, peer: &PeerId) {
        if let Some((_, writer)) = self.writers.remove(peer) {
            let _ = writer.lock().await.shutdown().await;
            let _ = self.tx.send(MeshEvent::Disconnected(peer.clone())).await;
            info!(peer = %peer, "Peer disconnected");
        }
    }

    fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.writers.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }

    async fn events(&self) -> Result<Receiver<MeshEvent>, NetworkError> {
        self.rx.lock().await.take().ok_or(NetworkError::EventsTaken)
    }
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), NetworkError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(NetworkError::FrameTooLarge { size: payload.len(), max: MAX_FRAME_LEN });
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, NetworkError> {
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(NetworkError::FrameTooLarge { size: len, max: MAX_FRAME_LEN });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}
