//! Peer coordination layer for chain synchronization.
//!
//! - [`peer`]: per-peer substate and the peer handler contract
//! - [`pool`]: copy-on-write pool of actively syncing peers
//! - [`registry`]: connection attempts, bans, and disconnect counters
//! - [`discovery`]: node discovery contract and in-memory directory
//! - [`queue`]: block queue collaborator contract
//! - [`transport`]: outbound connection dispatch contract
//! - [`sync`]: the synchronization manager and its workers

pub mod discovery;
pub mod peer;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod sync;
pub mod transport;
