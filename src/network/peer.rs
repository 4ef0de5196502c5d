//! Per-peer sync substate and the peer handler contract.

use crate::types::difficulty::Difficulty;
use crate::types::hash::Hash;

/// Peer identifier (hash of the peer's public key).
pub type PeerId = Hash;

/// Substate a single peer connection moves through during sync.
///
/// The manager posts transitions; the peer's protocol handler executes them
/// (issuing hash or block requests on the wire) and reports progress back
/// through the [`SyncPeer`] accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Connected, no work assigned.
    Idle,
    /// Walking its chain backward, delivering hash batches (master only).
    HashRetrieving,
    /// Hash enumeration finished; nothing left to walk.
    DoneHashes,
    /// Fetching block bodies for enumerated hashes.
    BlockRetrieving,
    /// Main synchronization finished; only fresh gossip from here on.
    DoneSync,
}

/// Wire-protocol disconnect reasons the sync layer hands to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCode {
    /// Disconnect requested by the local node.
    Requested = 0x00,
    /// Peer breaks the protocol.
    BadProtocol = 0x02,
    /// Peer makes no sync progress and is not worth the slot.
    UselessPeer = 0x03,
    /// Connection slots exhausted.
    TooManyPeers = 0x04,
}

/// Handle to one connected peer's protocol handler.
///
/// One instance per live connection, owned by the transport layer. All
/// methods are non-blocking: state changes are posts to the handler, and the
/// accessors read the handler's last reported snapshot.
pub trait SyncPeer: Send + Sync {
    /// Stable identifier of the remote peer.
    fn peer_id(&self) -> PeerId;

    /// Total difficulty the peer currently reports for its chain.
    fn total_difficulty(&self) -> Difficulty;

    /// Total difficulty from the peer's handshake status message.
    ///
    /// Unlike [`Self::total_difficulty`] this never changes after the
    /// handshake; it is the value the peer was admitted with.
    fn handshake_difficulty(&self) -> Difficulty;

    /// Hash of the best block the peer reports.
    fn best_hash(&self) -> Hash;

    /// Number of hashes this peer has delivered since it started hash
    /// retrieval. Monotonic while the connection lives.
    fn hashes_loaded_cnt(&self) -> u64;

    /// Current substate.
    fn state(&self) -> PeerState;

    /// True once the peer reported it has no further blocks to serve.
    fn has_no_more_blocks(&self) -> bool;

    /// Posts a substate transition to the peer's handler.
    fn change_state(&self, new_state: PeerState);

    /// Caps the number of hashes requested per batch.
    fn set_max_hashes_ask(&self, limit: u32);

    /// Asks the transport to close the connection with `reason`.
    fn disconnect(&self, reason: ReasonCode);

    /// Tells the handler not to relay transactions to this peer yet.
    ///
    /// Applied to peers admitted before the initial sync finishes; relaying
    /// a half-synced mempool wastes both sides' bandwidth.
    fn prohibit_transactions(&self);

    /// Notifies the handler that the manager dropped the connection state.
    fn on_disconnect(&self);

    /// Emits one line of per-peer sync statistics.
    fn log_sync_stats(&self);

    /// Connected with no work assigned.
    fn is_idle(&self) -> bool {
        self.state() == PeerState::Idle
    }

    /// Currently enumerating hashes.
    fn is_hash_retrieving(&self) -> bool {
        self.state() == PeerState::HashRetrieving
    }

    /// Finished enumerating hashes.
    fn is_hash_retrieving_done(&self) -> bool {
        self.state() == PeerState::DoneHashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::TestPeer;

    #[test]
    fn predicates_follow_state() {
        let peer = TestPeer::with_difficulty(1, 100);

        peer.change_state(PeerState::Idle);
        assert!(peer.is_idle());
        assert!(!peer.is_hash_retrieving());

        peer.change_state(PeerState::HashRetrieving);
        assert!(peer.is_hash_retrieving());
        assert!(!peer.is_hash_retrieving_done());

        peer.change_state(PeerState::DoneHashes);
        assert!(peer.is_hash_retrieving_done());
        assert!(!peer.is_idle());
    }

    #[test]
    fn reason_codes_carry_wire_values() {
        assert_eq!(ReasonCode::Requested as u8, 0x00);
        assert_eq!(ReasonCode::BadProtocol as u8, 0x02);
        assert_eq!(ReasonCode::UselessPeer as u8, 0x03);
        assert_eq!(ReasonCode::TooManyPeers as u8, 0x04);
    }
}
