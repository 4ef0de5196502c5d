//! Block queue collaborator contract.

use crate::types::hash::Hash;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Download pipeline shared between the sync layer and the validator.
///
/// Holds the FIFO of block hashes still to be fetched (the download plan
/// produced by hash retrieval) and the backlog of downloaded blocks waiting
/// for import. The sync layer steers the plan; peers in block-retrieving
/// state drain it; the validator drains the backlog.
pub trait BlockQueue: Send + Sync {
    /// True when the download plan holds no hashes.
    fn is_hashes_empty(&self) -> bool;

    /// Number of hashes currently in the download plan.
    fn hashes_len(&self) -> usize;

    /// True when downloaded backlog blocks are still waiting for import.
    fn has_solid_blocks(&self) -> bool;

    /// Drops the entire download plan.
    fn clear_hashes(&self);

    /// Puts `hash` at the front of the plan, to be fetched next.
    ///
    /// Used for point repairs: downloading the missing parent of a block
    /// whose gap is too small to justify a full recovery walk.
    fn add_first(&self, hash: Hash);

    /// Sets the hash the master walks backward from.
    fn set_best_hash(&self, hash: Hash);
}

/// In-memory [`BlockQueue`] for tests and single-process runs.
pub struct MemoryBlockQueue {
    hashes: Mutex<VecDeque<Hash>>,
    best_hash: Mutex<Option<Hash>>,
    solid_blocks: AtomicBool,
}

impl MemoryBlockQueue {
    /// Creates an empty queue.
    pub fn new() -> MemoryBlockQueue {
        MemoryBlockQueue {
            hashes: Mutex::new(VecDeque::new()),
            best_hash: Mutex::new(None),
            solid_blocks: AtomicBool::new(false),
        }
    }

    /// Appends a hash to the back of the plan, as a hash-retrieving peer
    /// delivering a batch would.
    pub fn push_hash(&self, hash: Hash) {
        self.hashes.lock().unwrap().push_back(hash);
    }

    /// Takes the next hash to fetch from the front of the plan.
    pub fn pop_hash(&self) -> Option<Hash> {
        self.hashes.lock().unwrap().pop_front()
    }

    /// The walk target last set via [`BlockQueue::set_best_hash`].
    pub fn best_hash(&self) -> Option<Hash> {
        *self.best_hash.lock().unwrap()
    }

    /// Marks whether backlog blocks are waiting for import.
    pub fn set_has_solid_blocks(&self, value: bool) {
        self.solid_blocks.store(value, Ordering::SeqCst);
    }
}

impl BlockQueue for MemoryBlockQueue {
    fn is_hashes_empty(&self) -> bool {
        self.hashes.lock().unwrap().is_empty()
    }

    fn hashes_len(&self) -> usize {
        self.hashes.lock().unwrap().len()
    }

    fn has_solid_blocks(&self) -> bool {
        self.solid_blocks.load(Ordering::SeqCst)
    }

    fn clear_hashes(&self) {
        self.hashes.lock().unwrap().clear();
    }

    fn add_first(&self, hash: Hash) {
        self.hashes.lock().unwrap().push_front(hash);
    }

    fn set_best_hash(&self, hash: Hash) {
        *self.best_hash.lock().unwrap() = Some(hash);
    }
}

impl Default for MemoryBlockQueue {
    fn default() -> Self {
        MemoryBlockQueue::new()
    }
}
