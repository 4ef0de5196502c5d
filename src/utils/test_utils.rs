//! Shared test doubles for the sync layer.

use crate::network::discovery::Node;
use crate::network::peer::{PeerId, PeerState, ReasonCode, SyncPeer};
use crate::network::sync::SyncListener;
use crate::network::transport::{ConnectError, Connector};
use crate::types::difficulty::Difficulty;
use crate::types::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scriptable peer handler.
///
/// Records everything the manager posts to it (state transitions, batch
/// caps, disconnect reasons) and lets tests steer what it reports back.
pub struct TestPeer {
    id: PeerId,
    difficulty: Mutex<Difficulty>,
    handshake_difficulty: Difficulty,
    best_hash: Hash,
    state: Mutex<PeerState>,
    states_seen: Mutex<Vec<PeerState>>,
    hashes_loaded: AtomicU64,
    max_hashes_ask: AtomicU32,
    no_more_blocks: AtomicBool,
    disconnects: Mutex<Vec<ReasonCode>>,
    dropped: AtomicBool,
    tx_prohibited: AtomicBool,
}

impl TestPeer {
    /// Peer with id `[seed; 32]`, reporting `difficulty` and `best_hash`.
    pub fn new(seed: u8, difficulty: u64, best_hash: Hash) -> Arc<TestPeer> {
        Arc::new(TestPeer {
            id: Self::id_of(seed),
            difficulty: Mutex::new(Difficulty::from(difficulty)),
            handshake_difficulty: Difficulty::from(difficulty),
            best_hash,
            state: Mutex::new(PeerState::Idle),
            states_seen: Mutex::new(Vec::new()),
            hashes_loaded: AtomicU64::new(0),
            max_hashes_ask: AtomicU32::new(0),
            no_more_blocks: AtomicBool::new(false),
            disconnects: Mutex::new(Vec::new()),
            dropped: AtomicBool::new(false),
            tx_prohibited: AtomicBool::new(false),
        })
    }

    /// Peer whose best hash is derived from its seed.
    pub fn with_difficulty(seed: u8, difficulty: u64) -> Arc<TestPeer> {
        TestPeer::new(seed, difficulty, Hash([seed; 32]))
    }

    /// The id a peer built from `seed` carries.
    pub fn id_of(seed: u8) -> PeerId {
        Hash([seed; 32])
    }

    pub fn set_difficulty(&self, difficulty: u64) {
        *self.difficulty.lock().unwrap() = Difficulty::from(difficulty);
    }

    pub fn set_no_more_blocks(&self, value: bool) {
        self.no_more_blocks.store(value, Ordering::SeqCst);
    }

    pub fn set_hashes_loaded(&self, count: u64) {
        self.hashes_loaded.store(count, Ordering::SeqCst);
    }

    /// All transitions posted to this peer, in order.
    pub fn states_seen(&self) -> Vec<PeerState> {
        self.states_seen.lock().unwrap().clone()
    }

    /// Disconnect reasons received, in order.
    pub fn disconnects(&self) -> Vec<ReasonCode> {
        self.disconnects.lock().unwrap().clone()
    }

    /// Last batch cap the manager set.
    pub fn max_hashes_ask(&self) -> u32 {
        self.max_hashes_ask.load(Ordering::SeqCst)
    }

    pub fn tx_prohibited(&self) -> bool {
        self.tx_prohibited.load(Ordering::SeqCst)
    }

    pub fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl SyncPeer for TestPeer {
    fn peer_id(&self) -> PeerId {
        self.id
    }

    fn total_difficulty(&self) -> Difficulty {
        self.difficulty.lock().unwrap().clone()
    }

    fn handshake_difficulty(&self) -> Difficulty {
        self.handshake_difficulty.clone()
    }

    fn best_hash(&self) -> Hash {
        self.best_hash
    }

    fn hashes_loaded_cnt(&self) -> u64 {
        self.hashes_loaded.load(Ordering::SeqCst)
    }

    fn state(&self) -> PeerState {
        *self.state.lock().unwrap()
    }

    fn has_no_more_blocks(&self) -> bool {
        self.no_more_blocks.load(Ordering::SeqCst)
    }

    fn change_state(&self, new_state: PeerState) {
        *self.state.lock().unwrap() = new_state;
        self.states_seen.lock().unwrap().push(new_state);
    }

    fn set_max_hashes_ask(&self, limit: u32) {
        self.max_hashes_ask.store(limit, Ordering::SeqCst);
    }

    fn disconnect(&self, reason: ReasonCode) {
        self.disconnects.lock().unwrap().push(reason);
    }

    fn prohibit_transactions(&self) {
        self.tx_prohibited.store(true, Ordering::SeqCst);
    }

    fn on_disconnect(&self) {
        self.dropped.store(true, Ordering::SeqCst);
    }

    fn log_sync_stats(&self) {
        crate::info!(
            "Peer {}: td {} loaded {}",
            self.id.short(),
            self.total_difficulty(),
            self.hashes_loaded_cnt()
        );
    }
}

/// Connector that records dial targets instead of dialing.
pub struct RecordingConnector {
    dialed: Mutex<Vec<Node>>,
    reject: AtomicBool,
}

impl RecordingConnector {
    pub fn new() -> Arc<RecordingConnector> {
        Arc::new(RecordingConnector {
            dialed: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        })
    }

    /// Makes every subsequent dial fail.
    pub fn reject_dials(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn dialed(&self) -> Vec<Node> {
        self.dialed.lock().unwrap().clone()
    }

    pub fn dialed_ids(&self) -> Vec<PeerId> {
        self.dialed().iter().map(|n| n.id).collect()
    }
}

impl Connector for RecordingConnector {
    fn connect(&self, node: &Node) -> Result<(), ConnectError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ConnectError::Rejected(node.address.clone()));
        }
        self.dialed.lock().unwrap().push(node.clone());
        Ok(())
    }
}

/// Listener counting completion signals.
pub struct CountingListener {
    count: AtomicUsize,
}

impl CountingListener {
    pub fn new() -> Arc<CountingListener> {
        Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl SyncListener for CountingListener {
    fn on_sync_done(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
