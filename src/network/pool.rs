//! Pool of actively syncing peers.

use crate::network::peer::{PeerId, PeerState, SyncPeer};
use std::sync::{Arc, RwLock};

/// Set of peers currently participating in sync.
///
/// Backed by a copy-on-write snapshot: every mutation installs a fresh
/// `Arc<Vec<_>>`, so the maintenance worker iterates a stable snapshot while
/// event threads add and remove peers concurrently. A peer removed mid-scan
/// simply stays visible until the scan's snapshot is dropped.
pub struct PeerPool {
    peers: RwLock<Arc<Vec<Arc<dyn SyncPeer>>>>,
}

impl PeerPool {
    /// Creates an empty pool.
    pub fn new() -> PeerPool {
        PeerPool {
            peers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Returns the current peer snapshot.
    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn SyncPeer>>> {
        self.peers.read().unwrap().clone()
    }

    /// Number of pooled peers.
    pub fn len(&self) -> usize {
        self.peers.read().unwrap().len()
    }

    /// True when no peer is pooled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if a peer with `id` is pooled.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.snapshot().iter().any(|p| p.peer_id() == *id)
    }

    /// Identifiers of all pooled peers.
    pub fn ids(&self) -> Vec<PeerId> {
        self.snapshot().iter().map(|p| p.peer_id()).collect()
    }

    /// Appends a peer to the pool.
    pub fn add(&self, peer: Arc<dyn SyncPeer>) {
        let mut guard = self.peers.write().unwrap();
        let mut next = (**guard).clone();
        next.push(peer);
        *guard = Arc::new(next);
    }

    /// Removes the peer with `id`, returning it if present.
    pub fn remove(&self, id: &PeerId) -> Option<Arc<dyn SyncPeer>> {
        let mut guard = self.peers.write().unwrap();
        let position = guard.iter().position(|p| p.peer_id() == *id)?;
        let mut next = (**guard).clone();
        let removed = next.remove(position);
        *guard = Arc::new(next);
        Some(removed)
    }

    /// Removes every peer matching `predicate` and returns them.
    pub fn remove_where(
        &self,
        predicate: impl Fn(&dyn SyncPeer) -> bool,
    ) -> Vec<Arc<dyn SyncPeer>> {
        let mut guard = self.peers.write().unwrap();
        let (removed, kept): (Vec<_>, Vec<_>) = guard
            .iter()
            .cloned()
            .partition(|p| predicate(p.as_ref()));
        if !removed.is_empty() {
            *guard = Arc::new(kept);
        }
        removed
    }

    /// Posts `new_state` to every pooled peer.
    pub fn change_state_all(&self, new_state: PeerState) {
        for peer in self.snapshot().iter() {
            peer.change_state(new_state);
        }
    }

    /// Posts `new_state` to every pooled peer matching `predicate`.
    pub fn change_state_where(
        &self,
        new_state: PeerState,
        predicate: impl Fn(&dyn SyncPeer) -> bool,
    ) {
        for peer in self.snapshot().iter() {
            if predicate(peer.as_ref()) {
                peer.change_state(new_state);
            }
        }
    }

    /// Peer reporting the highest total difficulty, if any.
    pub fn best_by_difficulty(&self) -> Option<Arc<dyn SyncPeer>> {
        self.snapshot()
            .iter()
            .max_by_key(|p| p.total_difficulty())
            .cloned()
    }
}

impl Default for PeerPool {
    fn default() -> Self {
        PeerPool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::TestPeer;

    #[test]
    fn add_and_remove_round_trip() {
        let pool = PeerPool::new();
        let peer = TestPeer::with_difficulty(1, 100);
        let id = peer.peer_id();

        assert!(pool.is_empty());
        pool.add(peer);
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&id));

        let removed = pool.remove(&id).expect("peer was pooled");
        assert_eq!(removed.peer_id(), id);
        assert!(pool.is_empty());
        assert!(pool.remove(&id).is_none());
    }

    #[test]
    fn snapshot_survives_concurrent_removal() {
        let pool = PeerPool::new();
        let a = TestPeer::with_difficulty(1, 100);
        let b = TestPeer::with_difficulty(2, 200);
        pool.add(a.clone());
        pool.add(b.clone());

        let snapshot = pool.snapshot();
        pool.remove(&a.peer_id());

        // the earlier snapshot still sees both peers
        assert_eq!(snapshot.len(), 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn best_by_difficulty_picks_heaviest_chain() {
        let pool = PeerPool::new();
        pool.add(TestPeer::with_difficulty(1, 50));
        pool.add(TestPeer::with_difficulty(2, 300));
        pool.add(TestPeer::with_difficulty(3, 200));

        let best = pool.best_by_difficulty().expect("pool is non-empty");
        assert_eq!(best.peer_id(), TestPeer::id_of(2));
    }

    #[test]
    fn best_by_difficulty_on_empty_pool() {
        assert!(PeerPool::new().best_by_difficulty().is_none());
    }

    #[test]
    fn bulk_transition_reaches_every_peer() {
        let pool = PeerPool::new();
        let a = TestPeer::with_difficulty(1, 100);
        let b = TestPeer::with_difficulty(2, 200);
        pool.add(a.clone());
        pool.add(b.clone());

        pool.change_state_all(PeerState::BlockRetrieving);

        assert_eq!(a.state(), PeerState::BlockRetrieving);
        assert_eq!(b.state(), PeerState::BlockRetrieving);
    }

    #[test]
    fn filtered_transition_skips_non_matching_peers() {
        let pool = PeerPool::new();
        let idle = TestPeer::with_difficulty(1, 100);
        let busy = TestPeer::with_difficulty(2, 200);
        busy.change_state(PeerState::HashRetrieving);
        pool.add(idle.clone());
        pool.add(busy.clone());

        pool.change_state_where(PeerState::BlockRetrieving, |p| p.is_idle());

        assert_eq!(idle.state(), PeerState::BlockRetrieving);
        assert_eq!(busy.state(), PeerState::HashRetrieving);
    }

    #[test]
    fn remove_where_partitions_pool() {
        let pool = PeerPool::new();
        let drained = TestPeer::with_difficulty(1, 100);
        drained.set_no_more_blocks(true);
        let serving = TestPeer::with_difficulty(2, 200);
        pool.add(drained.clone());
        pool.add(serving.clone());

        let removed = pool.remove_where(|p| p.has_no_more_blocks());

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].peer_id(), drained.peer_id());
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&serving.peer_id()));
    }
}
