//! Node discovery collaborator contract and an in-memory directory.

use crate::network::peer::PeerId;
use crate::types::difficulty::Difficulty;
use crate::types::hash::Hash;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

/// A node known to the discovery layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// Stable identifier derived from the node's public key.
    pub id: PeerId,
    /// Dialable address, in whatever form the transport understands.
    pub address: String,
}

/// Chain status a node reported in its last inbound status message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    /// Total difficulty the node claims for its chain.
    pub total_difficulty: Difficulty,
    /// Best block hash the node claims.
    pub best_hash: Hash,
}

/// Everything the discovery layer knows about one node.
#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub node: Node,
    /// Discovery reputation score; higher is better.
    pub reputation: u32,
    /// Last inbound status message, if the node ever sent one.
    pub status: Option<NodeStatus>,
}

impl NodeInfo {
    /// Total difficulty from the last status message, if any.
    pub fn status_difficulty(&self) -> Option<&Difficulty> {
        self.status.as_ref().map(|s| &s.total_difficulty)
    }
}

/// Callback for nodes entering or leaving the discovery table.
pub trait DiscoverListener: Send + Sync {
    /// A node passing the subscription predicate appeared or refreshed.
    fn node_appeared(&self, info: &NodeInfo);

    /// A node dropped out of the table.
    fn node_disappeared(&self, _info: &NodeInfo) {}
}

/// Subscription filter deciding which node events a listener receives.
pub type NodePredicate = Box<dyn Fn(&NodeInfo) -> bool + Send + Sync>;

/// Read access to the discovery layer's node table.
///
/// The discovery protocol itself (transport, liveness probing, reputation
/// scoring) lives elsewhere; the sync layer only subscribes to node events
/// and queries the table when it needs connection candidates.
pub trait NodeSource: Send + Sync {
    /// Subscribes `listener` to node events passing `predicate`.
    ///
    /// The predicate is evaluated at event time, so it may capture live
    /// state such as a difficulty watermark.
    fn add_listener(&self, listener: Arc<dyn DiscoverListener>, predicate: NodePredicate);

    /// Returns up to `limit` nodes passing `predicate`, best first per
    /// `ordering`.
    fn nodes(
        &self,
        predicate: &dyn Fn(&NodeInfo) -> bool,
        ordering: &dyn Fn(&NodeInfo, &NodeInfo) -> Ordering,
        limit: usize,
    ) -> Vec<NodeInfo>;
}

/// In-memory [`NodeSource`] for tests and single-process runs.
///
/// Nodes are fed in via [`NodeDirectory::observe`]; each observation
/// refreshes the table entry and fans out to matching listeners.
pub struct NodeDirectory {
    table: DashMap<PeerId, NodeInfo>,
    listeners: Mutex<Vec<(Arc<dyn DiscoverListener>, NodePredicate)>>,
}

impl NodeDirectory {
    /// Creates an empty directory.
    pub fn new() -> NodeDirectory {
        NodeDirectory {
            table: DashMap::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Inserts or refreshes `info` and notifies matching listeners.
    pub fn observe(&self, info: NodeInfo) {
        self.table.insert(info.node.id, info.clone());
        let listeners = self.listeners.lock().unwrap();
        for (listener, predicate) in listeners.iter() {
            if predicate(&info) {
                listener.node_appeared(&info);
            }
        }
    }

    /// Drops the node with `id` from the table and notifies listeners.
    pub fn forget(&self, id: &PeerId) {
        if let Some((_, info)) = self.table.remove(id) {
            let listeners = self.listeners.lock().unwrap();
            for (listener, predicate) in listeners.iter() {
                if predicate(&info) {
                    listener.node_disappeared(&info);
                }
            }
        }
    }

    /// Number of nodes currently known.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no node is known.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl NodeSource for NodeDirectory {
    fn add_listener(&self, listener: Arc<dyn DiscoverListener>, predicate: NodePredicate) {
        self.listeners.lock().unwrap().push((listener, predicate));
    }

    fn nodes(
        &self,
        predicate: &dyn Fn(&NodeInfo) -> bool,
        ordering: &dyn Fn(&NodeInfo, &NodeInfo) -> Ordering,
        limit: usize,
    ) -> Vec<NodeInfo> {
        let mut matches: Vec<NodeInfo> = self
            .table
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| ordering(a, b));
        matches.truncate(limit);
        matches
    }
}

impl Default for NodeDirectory {
    fn default() -> Self {
        NodeDirectory::new()
    }
}
