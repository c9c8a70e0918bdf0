//! Peer registry and liveness bookkeeping.
//!
//! The registry is the ordered ring of known peers with a cursor pointing at
//! the peer that currently has focus. It always contains the local peer and
//! the cursor always indexes a valid element. Liveness is tracked in a
//! separate map so the sweep worker and the registry can be locked
//! independently.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use scnp_types::{LinkAddr, Peer, PeerId};

use crate::error::DaemonError;

/// How long a peer may stay silent before the sweep removes it.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Ordered ring of known peers plus the focus cursor.
pub struct PeerRegistry {
    peers: Vec<Peer>,
    cursor: usize,
    wrap: bool,
    next_id: u32,
}

impl PeerRegistry {
    /// Create a registry holding only the local peer, which starts focused.
    #[must_use]
    pub fn new(local: Peer, wrap: bool) -> Self {
        let next_id = local.id.0 + 1;
        Self {
            peers: vec![local],
            cursor: 0,
            wrap,
            next_id,
        }
    }

    /// Allocate the next process-local peer id.
    pub fn mint_id(&mut self) -> PeerId {
        let id = PeerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a peer to the end of the ring.
    pub fn add(&mut self, peer: Peer) {
        debug!(peer = %peer.id, name = %peer.display_name, "peer added");
        self.peers.push(peer);
    }

    /// Insert a peer immediately before the element with `anchor`.
    pub fn add_before(&mut self, peer: Peer, anchor: PeerId) -> Result<(), DaemonError> {
        let index = self.index_of(anchor)?;
        self.peers.insert(index, peer);
        if index <= self.cursor {
            self.cursor += 1;
        }
        Ok(())
    }

    /// Remove a non-local peer from the ring.
    pub fn remove(&mut self, id: PeerId) -> Result<Peer, DaemonError> {
        let index = self.index_of(id)?;
        if self.peers[index].is_local {
            return Err(DaemonError::Config("cannot remove the local peer".to_string()));
        }
        let removed = self.peers.remove(index);
        if index < self.cursor || self.cursor >= self.peers.len() {
            self.cursor = self.cursor.saturating_sub(1);
        }
        debug!(peer = %removed.id, name = %removed.display_name, "peer removed");
        Ok(removed)
    }

    /// Swap the ring positions of two peers.
    pub fn swap(&mut self, a: PeerId, b: PeerId) -> Result<(), DaemonError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        self.peers.swap(ia, ib);
        if self.cursor == ia {
            self.cursor = ib;
        } else if self.cursor == ib {
            self.cursor = ia;
        }
        Ok(())
    }

    /// Move the cursor one step forward, wrapping or clamping at the end.
    pub fn next(&mut self) -> PeerId {
        if self.cursor + 1 < self.peers.len() {
            self.cursor += 1;
        } else if self.wrap {
            self.cursor = 0;
        }
        self.current().id
    }

    /// Move the cursor one step back, wrapping or clamping at the start.
    pub fn previous(&mut self) -> PeerId {
        if self.cursor > 0 {
            self.cursor -= 1;
        } else if self.wrap {
            self.cursor = self.peers.len() - 1;
        }
        self.current().id
    }

    #[must_use]
    pub fn current(&self) -> &Peer {
        &self.peers[self.cursor]
    }

    /// The unique local peer.
    #[must_use]
    pub fn local(&self) -> &Peer {
        self.peers
            .iter()
            .find(|p| p.is_local)
            .expect("registry always contains the local peer")
    }

    #[must_use]
    pub fn find(&self, predicate: impl Fn(&Peer) -> bool) -> Option<&Peer> {
        self.peers.iter().find(|p| predicate(p))
    }

    #[must_use]
    pub fn exists(&self, predicate: impl Fn(&Peer) -> bool) -> bool {
        self.peers.iter().any(|p| predicate(p))
    }

    #[must_use]
    pub fn by_addr(&self, addr: LinkAddr) -> Option<&Peer> {
        self.peers.iter().find(|p| !p.is_local && p.link_addr == addr)
    }

    #[must_use]
    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// Rename a peer, typically when its first Management packet arrives.
    pub fn rename(&mut self, id: PeerId, display_name: &str) -> Result<(), DaemonError> {
        let index = self.index_of(id)?;
        self.peers[index].display_name = display_name.to_string();
        Ok(())
    }

    /// Move focus to `id`, clearing it everywhere else and pointing the
    /// cursor at the newly focused peer.
    pub fn set_focus(&mut self, id: PeerId) -> Result<(), DaemonError> {
        let index = self.index_of(id)?;
        for peer in &mut self.peers {
            peer.has_focus = false;
        }
        self.peers[index].has_focus = true;
        self.cursor = index;
        Ok(())
    }

    /// Point the cursor at `id` without touching any focus flag. Used when
    /// an Ingress arrives: the sender becomes the navigation anchor for the
    /// Egress that completes the exchange, but focus must not move yet.
    pub fn point_at(&mut self, id: PeerId) -> Result<(), DaemonError> {
        self.cursor = self.index_of(id)?;
        Ok(())
    }

    /// Reorder the ring to follow `ids`; peers not listed keep their
    /// relative order after the listed ones. The cursor follows the peer it
    /// pointed at.
    pub fn reorder(&mut self, ids: &[PeerId]) -> Result<(), DaemonError> {
        for &id in ids {
            self.index_of(id)?;
        }
        let current = self.current().id;
        let mut reordered = Vec::with_capacity(self.peers.len());
        for &id in ids {
            if let Some(pos) = self.peers.iter().position(|p| p.id == id) {
                reordered.push(self.peers.remove(pos));
            }
        }
        reordered.append(&mut self.peers);
        self.peers = reordered;
        self.cursor = self
            .peers
            .iter()
            .position(|p| p.id == current)
            .unwrap_or(0);
        Ok(())
    }

    #[must_use]
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn index_of(&self, id: PeerId) -> Result<usize, DaemonError> {
        self.peers
            .iter()
            .position(|p| p.id == id)
            .ok_or(DaemonError::PeerNotFound(id))
    }
}

/// Last-seen timestamps for remote peers, keyed by id.
pub struct LivenessMap {
    last_seen: HashMap<PeerId, Instant>,
    timeout: Duration,
}

impl Default for LivenessMap {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout: LIVENESS_TIMEOUT,
        }
    }

    /// Override the expiry window. Test hook.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record that a packet was attributed to `id` just now.
    pub fn touch(&mut self, id: PeerId) {
        self.last_seen.insert(id, Instant::now());
    }

    pub fn remove(&mut self, id: PeerId) {
        self.last_seen.remove(&id);
    }

    /// Find one peer whose last packet is older than the expiry window.
    #[must_use]
    pub fn next_expired(&self) -> Option<PeerId> {
        let now = Instant::now();
        self.last_seen
            .iter()
            .find(|(_, &seen)| now.duration_since(seen) > self.timeout)
            .map(|(&id, _)| id)
    }
}
