use meshledger_types::{BlockHeader, PeerId};

/// Notifications for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    BlockCreated(BlockHeader),
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
    SyncRequired {
        peer: PeerId,
        local: u64,
        advertised: u64,
    },
    SyncCompleted {
        height: u64,
    },
}
