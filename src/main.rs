//! Chain synchronization node runner.
//!
//! Starts the sync manager against a simulated in-process network: a set of
//! remote nodes with heavier chains is announced through discovery, the
//! manager dials them, elects a master, enumerates hashes, and drives block
//! download until the local chain catches up.
//!
//! # Usage
//! ```text
//! chainsync [OPTIONS]
//! ```
//!
//! # Options
//! - `--peers <n>`: target pool size (default 3)
//! - `--max-hashes-ask <n>`: per-batch hash request cap (default 192)
//! - `--sim-peers <n>`: number of simulated remote nodes (default 5)
//! - `--chain-length <n>`: blocks each remote node is ahead (default 480)
//! - `--disable-sync`: start with synchronization off

use chainsync::core::block::{Block, BlockWrapper};
use chainsync::core::chain::{Chain, MemoryChain};
use chainsync::network::discovery::{Node, NodeDirectory, NodeInfo, NodeStatus};
use chainsync::network::peer::{PeerId, PeerState, ReasonCode, SyncPeer};
use chainsync::network::queue::{BlockQueue, MemoryBlockQueue};
use chainsync::network::sync::{SyncConfig, SyncListener, SyncManager, SyncState};
use chainsync::network::transport::{ConnectError, Connector};
use chainsync::types::difficulty::Difficulty;
use chainsync::types::hash::Hash;
use chainsync::{error, info};
use std::env;
use std::process;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let mut config = SyncConfig {
        sync_peer_count: 3,
        ..SyncConfig::default()
    };
    let mut sim_peers: u8 = 5;
    let mut chain_length: u64 = 480;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            "--peers" => {
                config.sync_peer_count = parse_value(&args, &mut i);
            }
            "--max-hashes-ask" => {
                config.max_hashes_ask = parse_value(&args, &mut i);
            }
            "--sim-peers" => {
                sim_peers = parse_value(&args, &mut i);
            }
            "--chain-length" => {
                chain_length = parse_value(&args, &mut i);
            }
            "--disable-sync" => {
                config.sync_enabled = false;
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if let Err(err) = config.validate() {
        eprintln!("Invalid configuration: {}", err);
        process::exit(1);
    }

    let genesis = Block {
        number: 0,
        hash: Hash::sha3(b"genesis"),
        parent_hash: Hash::zero(),
    };
    let chain = Arc::new(MemoryChain::new(genesis, Difficulty::from(10)));
    let queue = Arc::new(MemoryBlockQueue::new());
    let directory = Arc::new(NodeDirectory::new());
    let network = SimNetwork::new(queue.clone(), chain_length);
    let done = Arc::new(DoneSignal::new());

    let manager = SyncManager::new(
        config.clone(),
        chain.clone(),
        queue.clone(),
        directory.clone(),
        network.clone(),
        done.clone(),
    );
    network.attach(&manager);
    manager.start();

    if !config.sync_enabled {
        info!("Nothing to do, exiting");
        return;
    }

    // announce the simulated remote nodes through discovery
    for seed in 1..=sim_peers {
        directory.observe(sim_node_info(seed, chain_length));
    }

    // validator stand-in: drains the download plan and advances the chain
    // once the manager has moved the pool to block retrieval
    let validator_chain = chain.clone();
    let validator_queue = queue.clone();
    let validator_manager = manager.clone();
    tokio::spawn(async move {
        let mut imported = 0u64;
        loop {
            while matches!(
                validator_manager.state(),
                SyncState::BlockRetrieving | SyncState::DoneGapRecovery | SyncState::DoneSync
            ) {
                let Some(hash) = validator_queue.pop_hash() else {
                    break;
                };
                imported += 1;
                let best = validator_chain.best_block();
                let block = Block {
                    number: best.number + 1,
                    hash,
                    parent_hash: best.hash,
                };
                let difficulty = Difficulty::from(10 + imported);
                validator_chain.set_head(block, difficulty);
            }
            sleep(Duration::from_millis(100)).await;
        }
    });

    // once the plan drains during block retrieval, a fresh gossiped block
    // marks the head reached
    let head_manager = manager.clone();
    let head_chain = chain.clone();
    let head_queue = queue.clone();
    tokio::spawn(async move {
        loop {
            sleep(Duration::from_millis(200)).await;
            if head_queue.is_hashes_empty() && head_chain.best_block().number >= chain_length {
                let best = head_chain.best_block();
                let fresh = Block {
                    number: best.number + 1,
                    hash: Hash::sha3(&best.number.to_be_bytes()),
                    parent_hash: best.hash,
                };
                head_manager.notify_new_block_imported(&BlockWrapper::new(fresh, true));
                return;
            }
        }
    });

    tokio::select! {
        _ = done.wait() => {
            info!(
                "Synchronized: best block [{}], total difficulty [{}]",
                chain.best_block().number,
                chain.total_difficulty()
            );
        }
        _ = sleep(Duration::from_secs(120)) => {
            error!("Synchronization did not finish in time");
            manager.shutdown();
            process::exit(1);
        }
    }

    manager.shutdown();
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --peers <n>           Target pool size (default 3)");
    eprintln!("  --max-hashes-ask <n>  Per-batch hash request cap (default 192)");
    eprintln!("  --sim-peers <n>       Simulated remote nodes (default 5)");
    eprintln!("  --chain-length <n>    Blocks each remote node is ahead (default 480)");
    eprintln!("  --disable-sync        Start with synchronization off");
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: &mut usize) -> T {
    let flag = args[*i].clone();
    *i += 1;
    if *i >= args.len() {
        eprintln!("{} requires an argument", flag);
        process::exit(1);
    }
    let parsed = args[*i].parse().unwrap_or_else(|_| {
        eprintln!("Invalid value for {}: {}", flag, args[*i]);
        process::exit(1);
    });
    *i += 1;
    parsed
}

fn sim_peer_id(seed: u8) -> PeerId {
    // first byte doubles as the seed so the peer can rebuild its profile
    Hash([seed; 32])
}

fn sim_node_info(seed: u8, chain_length: u64) -> NodeInfo {
    NodeInfo {
        node: Node {
            id: sim_peer_id(seed),
            address: format!("10.0.0.{}:30303", seed),
        },
        reputation: seed as u32,
        status: Some(NodeStatus {
            total_difficulty: Difficulty::from(1000 + seed as u64 * 50),
            best_hash: Hash::sha3(&[b'b', b'e', b's', b't', seed]),
        }),
    }
}

/// Completion signal bridging `on_sync_done` to the main task.
struct DoneSignal {
    notify: Notify,
}

impl DoneSignal {
    fn new() -> DoneSignal {
        DoneSignal {
            notify: Notify::new(),
        }
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl SyncListener for DoneSignal {
    fn on_sync_done(&self) {
        self.notify.notify_one();
    }
}

/// In-process stand-in for the transport layer.
///
/// A dial "succeeds" by spawning a [`SimPeer`] a moment later and handing
/// it to the manager, the way a real transport reports a finished
/// handshake.
struct SimNetwork {
    queue: Arc<MemoryBlockQueue>,
    chain_length: u64,
    manager: Mutex<Weak<SyncManager>>,
}

impl SimNetwork {
    fn new(queue: Arc<MemoryBlockQueue>, chain_length: u64) -> Arc<SimNetwork> {
        Arc::new(SimNetwork {
            queue,
            chain_length,
            manager: Mutex::new(Weak::new()),
        })
    }

    fn attach(&self, manager: &Arc<SyncManager>) {
        *self.manager.lock().unwrap() = Arc::downgrade(manager);
    }
}

impl Connector for SimNetwork {
    fn connect(&self, node: &Node) -> Result<(), ConnectError> {
        let manager = self
            .manager
            .lock()
            .unwrap()
            .upgrade()
            .ok_or_else(|| ConnectError::Rejected(node.address.clone()))?;
        let peer = SimPeer::spawn(node.id, self.queue.clone(), self.chain_length);
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            manager.add_peer(peer);
        });
        Ok(())
    }
}

/// Simulated remote peer serving a chain `chain_length` blocks ahead.
struct SimPeer {
    id: PeerId,
    difficulty: Difficulty,
    best_hash: Hash,
    state: Mutex<PeerState>,
    hashes_remaining: AtomicU64,
    hashes_loaded: AtomicU64,
    max_hashes_ask: AtomicU32,
    queue: Arc<MemoryBlockQueue>,
}

impl SimPeer {
    fn spawn(id: PeerId, queue: Arc<MemoryBlockQueue>, chain_length: u64) -> Arc<SimPeer> {
        let seed = id.0[0];
        let peer = Arc::new(SimPeer {
            id,
            difficulty: Difficulty::from(1000 + seed as u64 * 50),
            best_hash: Hash::sha3(&[b'b', b'e', b's', b't', seed]),
            state: Mutex::new(PeerState::Idle),
            hashes_remaining: AtomicU64::new(chain_length),
            hashes_loaded: AtomicU64::new(0),
            max_hashes_ask: AtomicU32::new(0),
            queue,
        });

        let driver = peer.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_millis(50)).await;
                match driver.state() {
                    PeerState::HashRetrieving => driver.deliver_hash_batch(),
                    PeerState::DoneSync => return,
                    _ => {}
                }
            }
        });

        peer
    }

    fn deliver_hash_batch(&self) {
        let ask = self.max_hashes_ask.load(Ordering::SeqCst) as u64;
        let remaining = self.hashes_remaining.load(Ordering::SeqCst);
        let batch = ask.min(remaining);
        for n in 0..batch {
            let position = self.hashes_loaded.load(Ordering::SeqCst) + n;
            self.queue.push_hash(Hash::sha3(&position.to_be_bytes()));
        }
        self.hashes_loaded.fetch_add(batch, Ordering::SeqCst);
        self.hashes_remaining.fetch_sub(batch, Ordering::SeqCst);
        if self.hashes_remaining.load(Ordering::SeqCst) == 0 {
            self.change_state(PeerState::DoneHashes);
        }
    }
}

impl SyncPeer for SimPeer {
    fn peer_id(&self) -> PeerId {
        self.id
    }

    fn total_difficulty(&self) -> Difficulty {
        self.difficulty.clone()
    }

    fn handshake_difficulty(&self) -> Difficulty {
        self.difficulty.clone()
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
        false
    }

    fn change_state(&self, new_state: PeerState) {
        *self.state.lock().unwrap() = new_state;
    }

    fn set_max_hashes_ask(&self, limit: u32) {
        self.max_hashes_ask.store(limit, Ordering::SeqCst);
    }

    fn disconnect(&self, reason: ReasonCode) {
        info!("Peer {}: disconnecting, reason {:?}", self.id.short(), reason);
    }

    fn prohibit_transactions(&self) {}

    fn on_disconnect(&self) {}

    fn log_sync_stats(&self) {
        info!(
            "Peer {}: td {} | hashes loaded {}",
            self.id.short(),
            self.difficulty,
            self.hashes_loaded_cnt()
        );
    }
}
