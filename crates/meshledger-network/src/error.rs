use meshledger_consensus::ConsensusError;
use meshledger_storage::StorageError;
use meshledger_types::PeerId;
use thiserror::Error;

/// Errors raised by the mesh and the peer transport.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("Send to {peer} failed: {reason}")]
    SendFailed { peer: PeerId, reason: String },

    #[error("Session limit of {max} reached")]
    SessionLimit { max: usize },

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Mesh event stream already taken")]
    EventsTaken,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),
}

impl From<NetworkError> for ConsensusError {
    fn from(e: NetworkError) -> Self {
        match e {
            NetworkError::Consensus(inner) => inner,
            other => ConsensusError::Network(other.to_string()),
        }
    }
}
