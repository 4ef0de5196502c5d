//! Outbound connection dispatch contract.

use crate::network::discovery::Node;

/// Errors surfaced by a connection dispatch.
#[derive(Debug, chainsync_derive::Error)]
pub enum ConnectError {
    /// No route to the node's advertised address.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The transport refused to dial, e.g. it is shutting down.
    #[error("dial rejected for {0}")]
    Rejected(String),
}

/// Dials nodes on behalf of the sync layer.
///
/// `connect` must not block: it dispatches the dial and returns. Success is
/// reported later through the handshake path calling
/// [`crate::network::sync::SyncManager::add_peer`]; failure simply lets the
/// attempt age out of the connection registry.
pub trait Connector: Send + Sync {
    /// Starts connecting to `node`.
    ///
    /// # Errors
    /// Returns `ConnectError` when the dispatch itself fails; the caller
    /// logs and moves on.
    fn connect(&self, node: &Node) -> Result<(), ConnectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_messages_name_the_node() {
        let unreachable = ConnectError::Unreachable("10.0.0.1:30303".into());
        assert_eq!(
            unreachable.to_string(),
            "node unreachable: 10.0.0.1:30303"
        );

        let rejected = ConnectError::Rejected("10.0.0.2:30303".into());
        assert_eq!(rejected.to_string(), "dial rejected for 10.0.0.2:30303");
    }
}
