//! MeshLedger Network - peer sessions, gossip relay and chain sync over a mesh.
//!
//! A [`Mesh`] delivers opaque frames between devices. [`PeerTransport`] sits on top:
//! it admits sessions up to a bound, relays validated transactions once per gossip
//! epoch, drives consensus rounds and answers chain-sync requests.

pub mod error;
pub mod message;
pub mod session;
pub mod send_buffer;
pub mod epoch;
pub mod mesh;
pub mod local_mesh;
pub mod tcp_mesh;
pub mod sync_client;
pub mod transport;

pub use error::NetworkError;
pub use message::PeerMessage;
pub use session::{ConnectionState, DiscoveryState, PeerSession, SessionManager};
pub use send_buffer::SendBuffer;
pub use epoch::EpochClock;
pub use mesh::{Mesh, MeshEvent};
pub use local_mesh::{LocalHub, LocalMesh};
pub use tcp_mesh::TcpMesh;
pub use sync_client::SyncClient;
pub use transport::{PeerTransport, TransportConfig};
