//! The mesh abstraction: discovery plus frame delivery between devices.

use crate::error::NetworkError;
use async_trait::async_trait;
use bytes::Bytes;
use meshledger_types::PeerId;
use tokio::sync::mpsc::Receiver;

/// Something that happened on the mesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshEvent {
    Connected(PeerId),
    Disconnected(PeerId),
    Frame { from: PeerId, payload: Bytes },
}

/// Discovery and delivery for one device.
///
/// Advertising makes this device findable; browsing looks for advertising peers and
/// connects to them. Either side stopping leaves existing connections in place.
#[async_trait]
pub trait Mesh: Send + Sync {
    fn local_id(&self) -> PeerId;

    async fn start_advertising(&self);

    async fn stop_advertising(&self);

    async fn start_browsing(&self);

    async fn stop_browsing(&self);

    /// Deliver one frame to a connected peer.
    async fn send(&self, peer: &PeerId, frame: Bytes) -> Result<(), NetworkError>;

    /// Close the connection to `peer`, if any.
    async fn disconnect(&self, peer: &PeerId);

    /// Currently connected peers.
    fn peers(&self) -> Vec<PeerId>;

    /// The inbound event stream. Can only be taken once.
    async fn events(&self) -> Result<Receiver<MeshEvent>, NetworkError>;
}
