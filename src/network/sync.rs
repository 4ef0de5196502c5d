//! Chain synchronization control plane.
//!
//! Drives a pool of peer connections through hash enumeration and block
//! download until the local chain catches up with the network's best-known
//! chain:
//! 1. Discovery surfaces nodes claiming a heavier chain; connections are
//!    dispatched and tracked until the handshake admits a peer.
//! 2. The heaviest peer becomes the master and walks its chain backward,
//!    filling the block queue's hash store with a download plan.
//! 3. The rest of the pool fetches block bodies for the enumerated hashes.
//! 4. A freshly gossiped block whose parent is missing opens gap recovery,
//!    which re-runs hash enumeration over just the gap.
//!
//! A single maintenance worker re-evaluates the whole arrangement every few
//! seconds and recovers from stalled masters, lost peers, and stuck
//! connection slots. Nothing here blocks: peer transitions are posts to the
//! protocol handlers and the dial is a dispatch.

use crate::core::block::BlockWrapper;
use crate::core::chain::Chain;
use crate::network::discovery::{DiscoverListener, Node, NodeInfo, NodeSource};
use crate::network::peer::{PeerId, PeerState, ReasonCode, SyncPeer};
use crate::network::pool::PeerPool;
use crate::network::queue::BlockQueue;
use crate::network::registry::ConnectionRegistry;
use crate::network::transport::Connector;
use crate::types::difficulty::{Difficulty, Watermark};
use crate::types::hash::Hash;
use crate::utils::log::{self, Level, Logger};
use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

/// Delay between maintenance runs. The worker sleeps this long after each
/// run completes, so two runs can never overlap.
pub const SYNC_TICK: Duration = Duration::from_secs(3);

/// Delay between stats dumps.
pub const STATS_TICK: Duration = Duration::from_secs(30);

/// How long the master may deliver no hashes before it is rotated out.
pub const MASTER_STUCK_TIME_THRESHOLD: Duration = Duration::from_secs(60);

/// Gaps wider than this are recovered with a full hash walk; smaller ones
/// just pull the missing parent.
pub const LARGE_GAP_THRESHOLD: i64 = 5;

/// Global synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No peer admitted yet; nothing decided.
    Init,
    /// Master peer enumerates hashes; everyone else waits.
    HashRetrieving,
    /// Pool fetches block bodies for enumerated hashes.
    BlockRetrieving,
    /// Master re-enumerates hashes across a detected chain gap.
    GapRecovery,
    /// Gap walk finished; pool resumes block fetching.
    DoneGapRecovery,
    /// Local chain caught up; only fresh gossip from here on.
    DoneSync,
}

/// Sync layer configuration, read once at construction.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Master switch; when false the manager refuses to start.
    pub sync_enabled: bool,
    /// Target number of pooled peers.
    pub sync_peer_count: usize,
    /// Cap on hashes requested from the master per batch.
    pub max_hashes_ask: u32,
    /// Read timeout the transport applies to peer channels.
    pub peer_channel_read_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            sync_enabled: true,
            sync_peer_count: 8,
            max_hashes_ask: 192,
            peer_channel_read_timeout: Duration::from_secs(30),
        }
    }
}

/// Rejected [`SyncConfig`] values.
#[derive(Debug, chainsync_derive::Error)]
pub enum ConfigError {
    /// The pool target must admit at least one peer.
    #[error("sync peer count must be at least 1")]
    ZeroPeerCount,

    /// Hash batches of size zero would stall the master forever.
    #[error("max hashes ask must be at least 1")]
    ZeroHashBatch,
}

impl SyncConfig {
    /// Checks the configuration for values that cannot work.
    ///
    /// # Errors
    /// Returns the first offending value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_peer_count == 0 {
            return Err(ConfigError::ZeroPeerCount);
        }
        if self.max_hashes_ask == 0 {
            return Err(ConfigError::ZeroHashBatch);
        }
        Ok(())
    }
}

/// Receives the one-shot completion signal.
pub trait SyncListener: Send + Sync {
    /// Fired exactly once, when the main synchronization run finishes.
    fn on_sync_done(&self);
}

/// State guarded by the manager lock.
///
/// The global state, its predecessor, and the master pointer always change
/// together under this lock, so any observer holding it sees a consistent
/// picture.
struct ManagerState {
    state: SyncState,
    prev_state: SyncState,
    master: Option<Arc<dyn SyncPeer>>,
    /// Hash count snapshot taken when the master was put to work.
    last_hashes_loaded_cnt: u64,
    /// When the master was first seen making no progress.
    master_stuck_at: Option<Instant>,
    /// Batch cap handed to the next master.
    max_hashes_ask: u32,
    /// Hash the next master walks backward from.
    best_hash: Hash,
}

/// Coordinates peers, download state, and gap recovery for one node.
///
/// All collaborator seams are injected at construction; none of them call
/// back into this type except through the public event intake
/// ([`Self::add_peer`], [`Self::on_disconnect`], [`Self::recover_gap`],
/// [`Self::notify_new_block_imported`]).
pub struct SyncManager {
    config: SyncConfig,
    chain: Arc<dyn Chain>,
    queue: Arc<dyn BlockQueue>,
    node_source: Arc<dyn NodeSource>,
    connector: Arc<dyn Connector>,
    listener: Arc<dyn SyncListener>,
    pool: PeerPool,
    registry: ConnectionRegistry,
    inner: Mutex<ManagerState>,
    /// Latched on the first transition to [`SyncState::DoneSync`].
    sync_done_triggered: AtomicBool,
    /// Floor below which a peer's chain cannot be useful to us.
    lower_useful_difficulty: Watermark,
    /// Heaviest chain ever observed, locally or from any peer.
    highest_known_difficulty: Watermark,
    stopped: AtomicBool,
    log: Logger,
}

impl SyncManager {
    /// Creates a manager wired to its collaborators. Call
    /// [`Self::start`] to bring up the workers.
    pub fn new(
        config: SyncConfig,
        chain: Arc<dyn Chain>,
        queue: Arc<dyn BlockQueue>,
        node_source: Arc<dyn NodeSource>,
        connector: Arc<dyn Connector>,
        listener: Arc<dyn SyncListener>,
    ) -> Arc<SyncManager> {
        let max_hashes_ask = config.max_hashes_ask;
        Arc::new(SyncManager {
            config,
            chain,
            queue,
            node_source,
            connector,
            listener,
            pool: PeerPool::new(),
            registry: ConnectionRegistry::new(),
            inner: Mutex::new(ManagerState {
                state: SyncState::Init,
                prev_state: SyncState::Init,
                master: None,
                last_hashes_loaded_cnt: 0,
                master_stuck_at: None,
                max_hashes_ask,
                best_hash: Hash::zero(),
            }),
            sync_done_triggered: AtomicBool::new(false),
            lower_useful_difficulty: Watermark::new(),
            highest_known_difficulty: Watermark::new(),
            stopped: AtomicBool::new(false),
            log: Logger::new("sync"),
        })
    }

    /// Seeds the watermarks, subscribes to discovery, and spawns the
    /// maintenance and stats workers.
    pub fn start(self: &Arc<Self>) {
        if !self.config.sync_enabled {
            self.log.info("sync: OFF");
            return;
        }
        self.log.info("sync: ON");

        self.update_difficulties();
        self.subscribe_to_discovery();

        let worker = self.clone();
        tokio::spawn(async move {
            while !worker.is_stopped() {
                worker.tick_at(Instant::now());
                tokio::time::sleep(SYNC_TICK).await;
            }
        });

        if log::enabled(Level::Info) {
            let stats = self.clone();
            tokio::spawn(async move {
                while !stats.is_stopped() {
                    stats.log_stats_at(Instant::now());
                    tokio::time::sleep(STATS_TICK).await;
                }
            });
        }
    }

    /// Stops both workers and turns further event intake into no-ops.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Current global state.
    pub fn state(&self) -> SyncState {
        self.inner.lock().unwrap().state
    }

    /// Identifier of the current master peer, if one is elected.
    pub fn master_id(&self) -> Option<PeerId> {
        self.inner
            .lock()
            .unwrap()
            .master
            .as_ref()
            .map(|m| m.peer_id())
    }

    /// True once the main synchronization run has completed.
    pub fn is_sync_done(&self) -> bool {
        self.sync_done_triggered.load(Ordering::SeqCst)
    }

    /// Current useful-difficulty floor.
    pub fn lower_useful_difficulty(&self) -> Difficulty {
        self.lower_useful_difficulty.get()
    }

    /// Heaviest chain difficulty observed so far.
    pub fn highest_known_difficulty(&self) -> Difficulty {
        self.highest_known_difficulty.get()
    }

    // --- event intake ---------------------------------------------------

    /// Admits a freshly handshaken peer into the pool.
    ///
    /// Rejects peers whose chain cannot improve on what we already have.
    /// Admission may immediately kick off hash retrieval (first useful
    /// peer) or re-run the master election (substantially better peer).
    pub fn add_peer(&self, peer: Arc<dyn SyncPeer>) {
        if self.is_stopped() {
            return;
        }
        crate::trace!("Peer {}: adding", peer.peer_id().short());

        let peer_difficulty = peer.total_difficulty();
        self.registry.clear_attempt(&peer.peer_id());
        if self.registry.is_banned(&peer.peer_id()) {
            // a handshake can land while the ban is still running
            crate::trace!("Peer {}: is banned, skipping", peer.peer_id().short());
            return;
        }
        if peer_difficulty < self.lower_useful_difficulty.get() {
            self.log.info(&format!(
                "Peer {}: its difficulty lower than ours: {} vs {}, skipping",
                peer.peer_id().short(),
                peer_difficulty,
                self.lower_useful_difficulty.get()
            ));
            return;
        }
        self.pool.add(peer.clone());
        if !self.is_sync_done() {
            peer.prohibit_transactions();
        }
        self.log
            .info(&format!("Peer {}: added to pool", peer.peer_id().short()));

        let mut inner = self.inner.lock().unwrap();
        if inner.state == SyncState::Init {
            if self.queue.has_solid_blocks() {
                self.log.info(
                    "It seems that block retrieving was interrupted, starting from this state now",
                );
                self.change_state_locked(&mut inner, SyncState::BlockRetrieving);
            } else if peer_difficulty > self.highest_known_difficulty.get() {
                self.log.info(&format!(
                    "Peer {}: its chain is better than previously known: {} vs {}, initiating hash retrieving",
                    peer.peer_id().short(),
                    peer_difficulty,
                    self.highest_known_difficulty.get()
                ));
                self.change_state_locked(&mut inner, SyncState::HashRetrieving);
            } else {
                crate::trace!(
                    "Peer {}: its chain is worse than previously known: {} vs {}",
                    peer.peer_id().short(),
                    peer_difficulty,
                    self.highest_known_difficulty.get()
                );
            }
        }

        if inner.state == SyncState::HashRetrieving
            && !self
                .highest_known_difficulty
                .get()
                .in_20_percent_range(&peer_difficulty)
        {
            self.log.info(&format!(
                "Peer {}: its chain is better than previously known: {} vs {}, switching master",
                peer.peer_id().short(),
                peer_difficulty,
                self.highest_known_difficulty.get()
            ));
            self.change_state_locked(&mut inner, SyncState::HashRetrieving);
        }
    }

    /// Handles a dropped peer connection.
    ///
    /// Repeated disconnects are held against the peer: the sixth one within
    /// a ban lifetime gets it banned.
    pub fn on_disconnect(&self, peer: &dyn SyncPeer) {
        if self.is_stopped() {
            return;
        }
        crate::trace!("Peer {}: disconnected", peer.peer_id().short());

        peer.on_disconnect();
        self.pool.remove(&peer.peer_id());
        if self.registry.record_disconnect(peer.peer_id(), Instant::now()) {
            self.log.info(&format!(
                "Peer {}: banned due to disconnects exceeding",
                peer.peer_id().short()
            ));
        }
    }

    /// Reacts to a block whose parent is not known locally.
    ///
    /// Wide gaps re-run hash enumeration from the orphan's hash; narrow
    /// ones just schedule the missing parent at the front of the plan.
    pub fn recover_gap(&self, wrapper: &BlockWrapper) {
        if self.is_stopped() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.state == SyncState::GapRecovery {
            self.log.info("Gap recovery is already in progress, postpone");
            return;
        }

        let allowed = if wrapper.is_solid() {
            !matches!(inner.state, SyncState::Init | SyncState::HashRetrieving)
        } else {
            (inner.state == SyncState::BlockRetrieving && self.queue.is_hashes_empty())
                || matches!(
                    inner.state,
                    SyncState::DoneSync | SyncState::DoneGapRecovery
                )
        };
        if !allowed {
            self.log.info(&format!(
                "We are in {:?} state, postpone gap recovery for block.number [{}]",
                inner.state,
                wrapper.number()
            ));
            return;
        }

        let best = self.chain.best_block();
        let gap = wrapper.number() as i64 - best.number as i64;
        self.log.info(&format!(
            "Try to recover gap for {} block.number [{}] vs best.number [{}]",
            if wrapper.is_new_block() { "NEW" } else { "" },
            wrapper.number(),
            best.number
        ));
        if gap > LARGE_GAP_THRESHOLD {
            inner.max_hashes_ask = cmp::min(gap as u64, self.config.max_hashes_ask as u64) as u32;
            inner.best_hash = wrapper.hash();
            self.log.debug(&format!(
                "Recover blocks gap, block.number [{}], block.hash [{}]",
                wrapper.number(),
                wrapper.hash().short()
            ));
            self.change_state_locked(&mut inner, SyncState::GapRecovery);
        } else {
            self.log.info(&format!(
                "Forcing parent downloading for block.number [{}]",
                wrapper.number()
            ));
            self.queue.add_first(wrapper.parent_hash());
            self.log
                .debug(&format!("Hash store size [{}]", self.queue.hashes_len()));
        }
    }

    /// Notes that the validator imported a block.
    ///
    /// A freshly gossiped block making it into the chain means we are at
    /// the head: the main run is declared done.
    pub fn notify_new_block_imported(&self, wrapper: &BlockWrapper) {
        if self.is_stopped() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if matches!(
            inner.state,
            SyncState::DoneSync | SyncState::GapRecovery | SyncState::DoneGapRecovery
        ) {
            return;
        }
        if !wrapper.is_solid() {
            self.log.info(&format!(
                "NEW block.number [{}] imported",
                wrapper.number()
            ));
            self.change_state_locked(&mut inner, SyncState::DoneSync);
        } else {
            self.log.info(&format!(
                "NEW block.number [{}] block.minsSinceReceiving [{}] exceeds import time limit, continue sync",
                wrapper.number(),
                wrapper.time_since_receiving(Instant::now()).as_secs() / 60
            ));
        }
    }

    // --- state machine --------------------------------------------------

    /// Applies a global state transition.
    ///
    /// Serialized with peer admission; every transition in the system goes
    /// through here.
    pub fn change_state(&self, new_state: SyncState) {
        let mut inner = self.inner.lock().unwrap();
        self.change_state_locked(&mut inner, new_state);
    }

    fn change_state_locked(&self, inner: &mut ManagerState, new_state: SyncState) {
        match new_state {
            SyncState::HashRetrieving => {
                // a failed election must not leave a stale master behind
                inner.master = None;
                if self.pool.is_empty() {
                    return;
                }
                let Some(master) = self.pool.best_by_difficulty() else {
                    return;
                };
                self.highest_known_difficulty
                    .raise_to(&master.total_difficulty());
                inner.best_hash = master.best_hash();
                self.queue.clear_hashes();
                self.pool.change_state_all(PeerState::Idle);
                inner.max_hashes_ask = self.config.max_hashes_ask;
                inner.master = Some(master);
                self.run_hash_retrieving_on_master(inner);
            }
            SyncState::GapRecovery => {
                inner.master = None;
                if self.pool.is_empty() {
                    return;
                }
                let Some(master) = self.pool.best_by_difficulty() else {
                    return;
                };
                inner.master = Some(master);
                self.run_hash_retrieving_on_master(inner);
                self.log.info("Gap recovery initiated");
            }
            SyncState::BlockRetrieving => {
                inner.master = None;
                self.pool.change_state_all(PeerState::BlockRetrieving);
                self.log.info("Block retrieving initiated");
            }
            SyncState::DoneGapRecovery => {
                inner.master = None;
                self.pool.change_state_all(PeerState::BlockRetrieving);
                self.log.info("Done gap recovery");
            }
            SyncState::DoneSync => {
                if self.sync_done_triggered.swap(true, Ordering::SeqCst) {
                    return;
                }
                inner.master = None;
                self.pool.change_state_all(PeerState::DoneSync);
                self.listener.on_sync_done();
                self.log.info("Main synchronization is finished");
            }
            SyncState::Init => {}
        }
        if new_state != inner.state {
            inner.prev_state = inner.state;
            inner.state = new_state;
        }
    }

    /// Puts the elected master to work walking hashes.
    ///
    /// Single entry point for both hash retrieval and gap recovery, so the
    /// progress snapshot and stuck timer are always reset together.
    fn run_hash_retrieving_on_master(&self, inner: &mut ManagerState) {
        inner.last_hashes_loaded_cnt = 0;
        inner.master_stuck_at = None;
        self.queue.set_best_hash(inner.best_hash);
        let Some(master) = inner.master.clone() else {
            return;
        };
        master.set_max_hashes_ask(inner.max_hashes_ask);
        master.change_state(PeerState::HashRetrieving);
        self.log.info(&format!(
            "Master peer hashes retrieving initiated, best known hash [{}], askLimit [{}]",
            inner.best_hash.short(),
            inner.max_hashes_ask
        ));
        self.log.debug(&format!(
            "Our best block hash [{}]",
            self.chain.best_block_hash().short()
        ));
    }

    // --- maintenance ----------------------------------------------------

    /// One maintenance pass, evaluated at `now`.
    ///
    /// Step order matters: gap-recovery completion is noticed before the
    /// stuck check (a finished master must not be banned for idling), and
    /// the master check precedes the peer check so a freshly lost master
    /// can be replaced within the same pass.
    pub fn tick_at(&self, now: Instant) {
        self.update_difficulties();
        self.check_gap_recovery();
        self.check_master(now);
        self.check_peers();
        self.remove_outdated_connections(now);
        self.ask_new_peers(now);
        self.release_bans(now);
    }

    fn update_difficulties(&self) {
        let local = self.chain.total_difficulty();
        self.lower_useful_difficulty.raise_to(&local);
        self.highest_known_difficulty.raise_to(&local);
    }

    fn check_gap_recovery(&self) {
        let mut inner = self.inner.lock().unwrap();
        let Some(master) = inner.master.clone() else {
            return;
        };
        if inner.state == SyncState::GapRecovery
            && !master.is_hash_retrieving()
            && self.queue.is_hashes_empty()
        {
            let target = if inner.prev_state == SyncState::BlockRetrieving {
                SyncState::BlockRetrieving
            } else {
                SyncState::DoneGapRecovery
            };
            self.change_state_locked(&mut inner, target);
        }
    }

    fn check_master(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        let Some(master) = inner.master.clone() else {
            return;
        };
        if inner.state == SyncState::HashRetrieving && master.is_hash_retrieving_done() {
            self.change_state_locked(&mut inner, SyncState::BlockRetrieving);
        }
        if inner.state == SyncState::GapRecovery && master.is_hash_retrieving_done() {
            master.change_state(PeerState::BlockRetrieving);
        }

        if matches!(
            inner.state,
            SyncState::HashRetrieving | SyncState::GapRecovery
        ) {
            if master.hashes_loaded_cnt() > inner.last_hashes_loaded_cnt {
                inner.master_stuck_at = None;
            } else {
                match inner.master_stuck_at {
                    None => inner.master_stuck_at = Some(now),
                    Some(stuck_at) => {
                        if now.saturating_duration_since(stuck_at) > MASTER_STUCK_TIME_THRESHOLD {
                            inner.master_stuck_at = None;
                            master.disconnect(ReasonCode::UselessPeer);
                            self.log.info(&format!(
                                "Master peer {}: banned due to stuck timeout exceeding",
                                master.peer_id().short()
                            ));
                            self.ban_peer(&master.peer_id(), now);
                        }
                    }
                }
            }
        }
    }

    fn check_peers(&self) {
        // drop peers that ran out of blocks; their chain weight becomes the
        // new floor for prospective peers
        let drained = self.pool.remove_where(|p| p.has_no_more_blocks());
        for peer in drained {
            self.log.info(&format!(
                "Peer {}: has no more blocks, removing",
                peer.peer_id().short()
            ));
            peer.change_state(PeerState::Idle);
            // the floor never rises above the highest known difficulty
            self.lower_useful_difficulty
                .raise_to(&peer.handshake_difficulty());
            self.highest_known_difficulty
                .raise_to(&peer.handshake_difficulty());
        }

        let mut inner = self.inner.lock().unwrap();
        if matches!(
            inner.state,
            SyncState::HashRetrieving | SyncState::GapRecovery
        ) {
            let master_pooled = inner
                .master
                .as_ref()
                .is_some_and(|m| self.pool.contains(&m.peer_id()));
            if !master_pooled {
                self.log.info("Master peer has been lost, find a new one");
                let state = inner.state;
                self.change_state_locked(&mut inner, state);
            }
        }
        let state = inner.state;
        drop(inner);

        // idle peers meeting an empty hash store are put back to work once
        // more hashes show up
        if matches!(
            state,
            SyncState::BlockRetrieving | SyncState::DoneSync | SyncState::DoneGapRecovery
        ) && !self.queue.is_hashes_empty()
        {
            self.pool
                .change_state_where(PeerState::BlockRetrieving, |p| p.is_idle());
        }
    }

    fn remove_outdated_connections(&self, now: Instant) {
        let reclaimed = self.registry.prune_stale_attempts(now);
        if reclaimed > 0 {
            crate::trace!("Reclaimed {} outdated connection slots", reclaimed);
        }
    }

    fn ask_new_peers(&self, now: Instant) {
        let lack = self
            .config
            .sync_peer_count
            .saturating_sub(self.pool.len());
        if lack == 0 {
            return;
        }

        let mut in_use = self.registry.in_use();
        in_use.extend(self.pool.ids());
        let floor = self.lower_useful_difficulty.get();

        let mut candidates = self.node_source.nodes(
            &|info: &NodeInfo| match info.status_difficulty() {
                Some(difficulty) => !in_use.contains(&info.node.id) && *difficulty > floor,
                None => false,
            },
            &|a, b| b.status_difficulty().cmp(&a.status_difficulty()),
            lack,
        );

        // nothing useful known and nobody pooled: settle for reputation so
        // the pool does not stay empty forever
        if self.pool.is_empty() && candidates.is_empty() {
            candidates = self.node_source.nodes(
                &|info: &NodeInfo| info.status.is_some() && !in_use.contains(&info.node.id),
                &|a, b| b.reputation.cmp(&a.reputation),
                lack,
            );
        }

        if log::enabled(Level::Trace) && !candidates.is_empty() {
            let ids: Vec<String> = candidates.iter().map(|n| n.node.id.short()).collect();
            crate::trace!("Node list obtained from discovery: {}", ids.join(", "));
        }

        for candidate in &candidates {
            self.initiate_connection(&candidate.node, now);
        }
    }

    fn release_bans(&self, now: Instant) {
        for id in self.registry.release_expired_bans(now) {
            self.log
                .info(&format!("Peer {}: releasing ban", id.short()));
        }
    }

    /// Dispatches a connection to `node` unless it is already pooled or
    /// being dialed.
    fn initiate_connection(&self, node: &Node, now: Instant) {
        crate::trace!("Peer {}: initiate connection", node.id.short());
        if self.pool.contains(&node.id) || !self.registry.try_begin_attempt(node.id, now) {
            crate::trace!("Peer {}: connection already initiated", node.id.short());
            return;
        }
        if let Err(err) = self.connector.connect(node) {
            // the slot stays claimed and ages out through the usual timeout
            self.log
                .warn(&format!("Peer {}: {}", node.id.short(), err));
        }
    }

    fn ban_peer(&self, id: &PeerId, now: Instant) {
        self.registry.ban(*id, now);
        self.pool.remove(id);
    }

    fn subscribe_to_discovery(self: &Arc<Self>) {
        let subscriber = Arc::new(DiscoverySubscriber {
            manager: Arc::downgrade(self),
        });
        let weak = Arc::downgrade(self);
        self.node_source.add_listener(
            subscriber,
            Box::new(move |info: &NodeInfo| {
                let Some(manager) = weak.upgrade() else {
                    return false;
                };
                match info.status_difficulty() {
                    Some(difficulty) => !manager
                        .highest_known_difficulty
                        .get()
                        .in_20_percent_range(difficulty),
                    None => false,
                }
            }),
        );
    }

    /// Dumps pool and ban statistics, evaluated at `now`.
    pub fn log_stats_at(&self, now: Instant) {
        let peers = self.pool.snapshot();
        if !peers.is_empty() {
            self.log.info("Active peers");
            self.log.info("============");
            for peer in peers.iter() {
                peer.log_sync_stats();
            }
        }

        let bans = self.registry.bans_with_ages(now);
        if !bans.is_empty() {
            self.log.info("Banned peers");
            self.log.info("============");
            for (id, age) in bans {
                self.log.info(&format!(
                    "Peer {} | {} minutes ago",
                    id.short(),
                    age.as_secs() / 60
                ));
            }
        }

        self.log.info(&format!("State {:?}", self.state()));
    }
}

/// Forwards qualifying discovery events into connection attempts.
struct DiscoverySubscriber {
    manager: Weak<SyncManager>,
}

impl DiscoverListener for DiscoverySubscriber {
    fn node_appeared(&self, info: &NodeInfo) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        if manager.is_stopped() {
            return;
        }
        if manager.registry.is_banned(&info.node.id) || manager.registry.has_attempt(&info.node.id)
        {
            return;
        }
        if let Some(difficulty) = info.status_difficulty() {
            crate::trace!(
                "Peer {}: new best chain peer discovered: {} vs {}",
                info.node.id.short(),
                difficulty,
                manager.highest_known_difficulty.get()
            );
        }
        manager.initiate_connection(&info.node, Instant::now());
    }
}
