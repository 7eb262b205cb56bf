//! Peer session bookkeeping and admission control.

use crate::error::NetworkError;
use meshledger_types::PeerId;
use std::collections::HashMap;
use std::time::Instant;

/// Whether this node is advertising and browsing for new peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryState {
    Discoverable,
    /// At the session bound; discovery is paused until a session drops
    Suspended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Clone, Debug)]
pub struct PeerSession {
    pub peer: PeerId,
    pub state: ConnectionState,
    pub connected_at: Instant,
}

/// Bounded set of live peer sessions.
#[derive(Debug)]
pub struct SessionManager {
    max_sessions: usize,
    sessions: HashMap<PeerId, PeerSession>,
}

impl SessionManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            sessions: HashMap::new(),
        }
    }

    /// Admit `peer`. Returns `false` when it already had a session.
    pub fn admit(&mut self, peer: PeerId) -> Result<bool, NetworkError> {
        if self.sessions.contains_key(&peer) {
            return Ok(false);
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(NetworkError::SessionLimit { max: self.max_sessions });
        }
        self.sessions.insert(
            peer.clone(),
            PeerSession {
                peer,
                state: ConnectionState::Connected,
                connected_at: Instant::now(),
            },
        );
        Ok(true)
    }

    /// Drop the session for `peer`. Returns the closed session, if there was one.
    pub fn remove(&mut self, peer: &PeerId) -> Option<PeerSession> {
        self.sessions.remove(peer).map(|mut session| {
            session.state = ConnectionState::Disconnected;
            session
        })
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.sessions.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Connected peers in id order.
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.sessions.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn discovery_state(&self) -> DiscoveryState {
        if self.sessions.len() >= self.max_sessions {
            DiscoveryState::Suspended
        } else {
            DiscoveryState::Discoverable
        }
    }
}
