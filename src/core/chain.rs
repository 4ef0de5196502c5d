//! Local chain collaborator contract.

use crate::core::block::Block;
use crate::types::difficulty::Difficulty;
use crate::types::hash::Hash;
use std::sync::RwLock;

/// Read access to the locally imported chain.
///
/// The sync layer consults the chain for its best block and cumulative
/// difficulty when seeding watermarks and measuring gaps. Implementors never
/// call back into the sync layer; block import completion is reported through
/// [`crate::network::sync::SyncManager::notify_new_block_imported`] by
/// whoever drives the validator.
pub trait Chain: Send + Sync {
    /// Best (highest imported) block of the local chain.
    fn best_block(&self) -> Block;

    /// Cumulative difficulty of the local chain at its best block.
    fn total_difficulty(&self) -> Difficulty;

    /// Hash of the best block.
    fn best_block_hash(&self) -> Hash {
        self.best_block().hash
    }
}

/// In-memory [`Chain`] for tests and single-process runs.
pub struct MemoryChain {
    inner: RwLock<ChainHead>,
}

struct ChainHead {
    best_block: Block,
    total_difficulty: Difficulty,
}

impl MemoryChain {
    /// Creates a chain whose head is `best_block` at `total_difficulty`.
    pub fn new(best_block: Block, total_difficulty: Difficulty) -> MemoryChain {
        MemoryChain {
            inner: RwLock::new(ChainHead {
                best_block,
                total_difficulty,
            }),
        }
    }

    /// Advances the head, e.g. after a simulated import.
    pub fn set_head(&self, best_block: Block, total_difficulty: Difficulty) {
        let mut inner = self.inner.write().unwrap();
        inner.best_block = best_block;
        inner.total_difficulty = total_difficulty;
    }
}

impl Chain for MemoryChain {
    fn best_block(&self) -> Block {
        self.inner.read().unwrap().best_block
    }

    fn total_difficulty(&self) -> Difficulty {
        self.inner.read().unwrap().total_difficulty.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> Block {
        Block {
            number: 0,
            hash: Hash::sha3(b"genesis"),
            parent_hash: Hash::zero(),
        }
    }

    #[test]
    fn head_starts_at_construction_values() {
        let chain = MemoryChain::new(genesis(), Difficulty::from(10));
        assert_eq!(chain.best_block().number, 0);
        assert_eq!(chain.total_difficulty(), Difficulty::from(10));
        assert_eq!(chain.best_block_hash(), genesis().hash);
    }

    #[test]
    fn set_head_advances_chain() {
        let chain = MemoryChain::new(genesis(), Difficulty::from(10));
        let next = Block {
            number: 1,
            hash: Hash::sha3(b"block-1"),
            parent_hash: genesis().hash,
        };

        chain.set_head(next, Difficulty::from(25));

        assert_eq!(chain.best_block().number, 1);
        assert_eq!(chain.total_difficulty(), Difficulty::from(25));
    }
}
