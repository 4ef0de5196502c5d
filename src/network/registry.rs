//! Bookkeeping for connection attempts, bans, and disconnect counters.

use crate::network::peer::PeerId;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// How long an initiated connection may sit unanswered before its slot is
/// reclaimed.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a ban keeps a peer out before it may be dialed again.
pub const BAN_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Number of disconnects a peer may accumulate; one more and it is banned.
pub const DISCONNECT_HITS_THRESHOLD: u32 = 5;

/// Tracks every peer the sync layer is negotiating with but not yet pooled.
///
/// Three maps keyed by peer id, all guarded by one mutex so a peer moves
/// between them atomically:
/// - in-flight connection attempts, expiring after [`CONNECTION_TIMEOUT`];
/// - bans, expiring after [`BAN_TIMEOUT`];
/// - disconnect counters, cleared when the peer is banned.
pub struct ConnectionRegistry {
    inner: std::sync::Mutex<RegistryMaps>,
}

#[derive(Default)]
struct RegistryMaps {
    connect_attempts: HashMap<PeerId, Instant>,
    bans: HashMap<PeerId, Instant>,
    disconnect_hits: HashMap<PeerId, u32>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> ConnectionRegistry {
        ConnectionRegistry {
            inner: std::sync::Mutex::new(RegistryMaps::default()),
        }
    }

    /// Records that a connection to `id` was dispatched at `now`.
    pub fn note_attempt(&self, id: PeerId, now: Instant) {
        self.inner.lock().unwrap().connect_attempts.insert(id, now);
    }

    /// Claims the connect slot for `id` at `now`.
    ///
    /// Returns false when an attempt is already in flight, so concurrent
    /// callers cannot dial the same node twice.
    pub fn try_begin_attempt(&self, id: PeerId, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.connect_attempts.contains_key(&id) {
            return false;
        }
        inner.connect_attempts.insert(id, now);
        true
    }

    /// True if a connection to `id` is currently in flight.
    pub fn has_attempt(&self, id: &PeerId) -> bool {
        self.inner.lock().unwrap().connect_attempts.contains_key(id)
    }

    /// Drops the in-flight record for `id`, e.g. once the handshake landed.
    pub fn clear_attempt(&self, id: &PeerId) {
        self.inner.lock().unwrap().connect_attempts.remove(id);
    }

    /// Removes attempts older than [`CONNECTION_TIMEOUT`] as of `now`.
    /// Returns how many slots were reclaimed.
    pub fn prune_stale_attempts(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.connect_attempts.len();
        inner
            .connect_attempts
            .retain(|_, started| now.saturating_duration_since(*started) <= CONNECTION_TIMEOUT);
        before - inner.connect_attempts.len()
    }

    /// Bans `id` as of `now`.
    ///
    /// Also drops any in-flight attempt and the disconnect counter, so the
    /// id lives in exactly one map afterwards.
    pub fn ban(&self, id: PeerId, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_attempts.remove(&id);
        inner.disconnect_hits.remove(&id);
        inner.bans.insert(id, now);
    }

    /// True if `id` is currently banned.
    pub fn is_banned(&self, id: &PeerId) -> bool {
        self.inner.lock().unwrap().bans.contains_key(id)
    }

    /// Releases bans older than [`BAN_TIMEOUT`] as of `now`, returning the
    /// released ids.
    pub fn release_expired_bans(&self, now: Instant) -> Vec<PeerId> {
        let mut inner = self.inner.lock().unwrap();
        let released: Vec<PeerId> = inner
            .bans
            .iter()
            .filter(|(_, banned_at)| now.saturating_duration_since(**banned_at) > BAN_TIMEOUT)
            .map(|(id, _)| *id)
            .collect();
        for id in &released {
            inner.bans.remove(id);
        }
        released
    }

    /// Currently banned peers with the age of each ban as of `now`.
    pub fn bans_with_ages(&self, now: Instant) -> Vec<(PeerId, Duration)> {
        self.inner
            .lock()
            .unwrap()
            .bans
            .iter()
            .map(|(id, banned_at)| (*id, now.saturating_duration_since(*banned_at)))
            .collect()
    }

    /// Counts a disconnect for `id` at `now`.
    ///
    /// Returns true when the incremented counter exceeds
    /// [`DISCONNECT_HITS_THRESHOLD`]; the peer is then banned and its
    /// counter dropped, all under the same lock acquisition.
    pub fn record_disconnect(&self, id: PeerId, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_attempts.remove(&id);
        let hits = inner.disconnect_hits.entry(id).or_insert(0);
        *hits += 1;
        if *hits > DISCONNECT_HITS_THRESHOLD {
            inner.disconnect_hits.remove(&id);
            inner.bans.insert(id, now);
            true
        } else {
            false
        }
    }

    /// Ids that are spoken for: in-flight attempts plus active bans.
    ///
    /// Pooled peers are tracked elsewhere; callers union them in.
    pub fn in_use(&self) -> HashSet<PeerId> {
        let inner = self.inner.lock().unwrap();
        inner
            .connect_attempts
            .keys()
            .chain(inner.bans.keys())
            .copied()
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        ConnectionRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hash::Hash;

    fn id(seed: u8) -> PeerId {
        Hash([seed; 32])
    }

    #[test]
    fn attempts_expire_after_connection_timeout() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();
        registry.note_attempt(id(1), t0);
        registry.note_attempt(id(2), t0 + Duration::from_secs(30));

        assert_eq!(
            registry.prune_stale_attempts(t0 + CONNECTION_TIMEOUT + Duration::from_secs(1)),
            1
        );
        assert!(!registry.has_attempt(&id(1)));
        assert!(registry.has_attempt(&id(2)));
    }

    #[test]
    fn attempt_exactly_at_timeout_survives() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();
        registry.note_attempt(id(1), t0);

        assert_eq!(registry.prune_stale_attempts(t0 + CONNECTION_TIMEOUT), 0);
        assert!(registry.has_attempt(&id(1)));
    }

    #[test]
    fn bans_release_after_ban_timeout() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();
        registry.ban(id(1), t0);

        assert!(registry.is_banned(&id(1)));
        assert!(registry
            .release_expired_bans(t0 + BAN_TIMEOUT)
            .is_empty());
        let released = registry.release_expired_bans(t0 + BAN_TIMEOUT + Duration::from_secs(1));
        assert_eq!(released, vec![id(1)]);
        assert!(!registry.is_banned(&id(1)));
    }

    #[test]
    fn ban_clears_attempt_and_hits() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();
        registry.note_attempt(id(1), t0);
        registry.record_disconnect(id(1), t0);

        registry.ban(id(1), t0);

        assert!(!registry.has_attempt(&id(1)));
        // counter restarted: five more disconnects stay under the threshold
        for _ in 0..5 {
            assert!(!registry.record_disconnect(id(1), t0));
        }
    }

    #[test]
    fn sixth_disconnect_bans_the_peer() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();

        for _ in 0..5 {
            assert!(!registry.record_disconnect(id(7), t0));
        }
        assert!(registry.record_disconnect(id(7), t0));
        assert!(registry.is_banned(&id(7)));

        // the counter was dropped along with the ban
        assert!(registry
            .in_use()
            .contains(&id(7)));
    }

    #[test]
    fn begin_attempt_claims_slot_once() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();

        assert!(registry.try_begin_attempt(id(1), t0));
        assert!(!registry.try_begin_attempt(id(1), t0 + Duration::from_secs(1)));

        registry.clear_attempt(&id(1));
        assert!(registry.try_begin_attempt(id(1), t0));
    }

    #[test]
    fn in_use_unions_attempts_and_bans() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();
        registry.note_attempt(id(1), t0);
        registry.ban(id(2), t0);

        let in_use = registry.in_use();
        assert!(in_use.contains(&id(1)));
        assert!(in_use.contains(&id(2)));
        assert_eq!(in_use.len(), 2);
    }

    #[test]
    fn bans_with_ages_reports_elapsed_time() {
        let registry = ConnectionRegistry::new();
        let t0 = Instant::now();
        registry.ban(id(1), t0);

        let ages = registry.bans_with_ages(t0 + Duration::from_secs(120));
        assert_eq!(ages.len(), 1);
        assert_eq!(ages[0], (id(1), Duration::from_secs(120)));
    }
}
