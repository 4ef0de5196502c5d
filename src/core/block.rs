//! Sync-facing view of a block and its arrival context.
//!
//! The sync layer never inspects transactions or validates headers; it only
//! needs a block's position in the chain (number, hash, parent hash) to plan
//! downloads and detect gaps. Full block contents stay with the validation
//! engine behind the [`crate::core::chain::Chain`] seam.

use crate::types::hash::Hash;
use std::time::{Duration, Instant};

/// A received block older than this no longer counts as freshly gossiped.
///
/// Blocks sit in the import queue while the validator drains a backlog; once
/// one has waited this long it tells us nothing about being near the chain
/// head anymore.
pub const SOLID_BLOCK_AGE: Duration = Duration::from_secs(60);

/// Chain coordinates of a block, as seen by the sync layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    /// Block index in the chain (genesis = 0).
    pub number: u64,
    /// Header hash identifying this block.
    pub hash: Hash,
    /// Hash of the parent block, forming the chain.
    pub parent_hash: Hash,
}

/// A block together with how it reached us.
///
/// Distinguishes blocks pulled in as part of the download backlog from blocks
/// freshly gossiped by the network, and remembers when the block arrived. A
/// fresh gossiped block near the chain head is the signal that the main
/// synchronization run is over.
#[derive(Clone, Debug)]
pub struct BlockWrapper {
    block: Block,
    new_block: bool,
    received_at: Instant,
}

impl BlockWrapper {
    /// Wraps a block received just now.
    ///
    /// `new_block` marks a freshly gossiped block, as opposed to one fetched
    /// from the download backlog.
    pub fn new(block: Block, new_block: bool) -> BlockWrapper {
        BlockWrapper::received_at(block, new_block, Instant::now())
    }

    /// Wraps a block with an explicit receipt time.
    ///
    /// Used when the receipt time is known from queue bookkeeping rather
    /// than the current instant.
    pub fn received_at(block: Block, new_block: bool, received_at: Instant) -> BlockWrapper {
        BlockWrapper {
            block,
            new_block,
            received_at,
        }
    }

    /// Block index in the chain.
    pub fn number(&self) -> u64 {
        self.block.number
    }

    /// Header hash of the wrapped block.
    pub fn hash(&self) -> Hash {
        self.block.hash
    }

    /// Parent hash of the wrapped block.
    pub fn parent_hash(&self) -> Hash {
        self.block.parent_hash
    }

    /// True if the block arrived as fresh gossip rather than backlog.
    pub fn is_new_block(&self) -> bool {
        self.new_block
    }

    /// Time elapsed between receipt and `now`.
    pub fn time_since_receiving(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }

    /// True if this block is backlog material rather than a fresh signal.
    ///
    /// A block is solid when it was fetched as part of the download plan, or
    /// when a gossiped block has aged past [`SOLID_BLOCK_AGE`] before import.
    pub fn is_solid(&self) -> bool {
        self.is_solid_at(Instant::now())
    }

    /// [`Self::is_solid`] evaluated against an explicit instant.
    pub fn is_solid_at(&self, now: Instant) -> bool {
        !self.new_block || self.time_since_receiving(now) > SOLID_BLOCK_AGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: u64) -> Block {
        Block {
            number,
            hash: Hash::sha3(&number.to_be_bytes()),
            parent_hash: Hash::sha3(&(number - 1).to_be_bytes()),
        }
    }

    #[test]
    fn backlog_block_is_solid() {
        let wrapper = BlockWrapper::new(block(5), false);
        assert!(wrapper.is_solid());
        assert!(!wrapper.is_new_block());
    }

    #[test]
    fn fresh_block_is_not_solid() {
        let wrapper = BlockWrapper::new(block(5), true);
        assert!(!wrapper.is_solid());
        assert!(wrapper.is_new_block());
    }

    #[test]
    fn fresh_block_turns_solid_after_age_window() {
        let received = Instant::now();
        let wrapper = BlockWrapper::received_at(block(5), true, received);

        assert!(!wrapper.is_solid_at(received + SOLID_BLOCK_AGE));
        assert!(wrapper.is_solid_at(received + SOLID_BLOCK_AGE + Duration::from_secs(1)));
    }

    #[test]
    fn wrapper_exposes_chain_coordinates() {
        let b = block(7);
        let wrapper = BlockWrapper::new(b, true);
        assert_eq!(wrapper.number(), 7);
        assert_eq!(wrapper.hash(), b.hash);
        assert_eq!(wrapper.parent_hash(), b.parent_hash);
    }
}
