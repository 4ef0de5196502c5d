//! Chain-facing types and the local chain contract.
//!
//! - [`block`]: the sync layer's view of a block and its arrival context
//! - [`chain`]: read access to the locally imported chain

pub mod block;
pub mod chain;
