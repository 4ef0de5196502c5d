//! 32-byte SHA3-256 hash type used for block hashes and peer identifiers.

use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte hash used throughout the sync layer.
///
/// Identifies both blocks (header hashes) and peers (hash of the peer's
/// public key). This type is `Copy` - hashes are compared and passed around
/// constantly while walking hash chains, and 32 bytes on the stack beats
/// reference indirection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Creates a zero-valued hash (all bytes are 0x00).
    ///
    /// Used as a sentinel for the genesis parent or an unset best hash.
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    /// Returns the hash as a byte slice.
    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Creates a hash from a byte slice.
    ///
    /// Returns `None` if the slice length is not exactly [`HASH_LEN`] bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Hash> {
        if slice.len() != HASH_LEN {
            return None;
        }
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(slice);
        Some(Hash(bytes))
    }

    /// Computes the SHA3-256 digest of `data`.
    pub fn sha3(data: &[u8]) -> Hash {
        Hash(Sha3_256::digest(data).into())
    }

    /// Abbreviated hex form (first four bytes) for log output.
    ///
    /// Full 64-character identifiers drown log lines; eight hex characters
    /// are enough to tell peers apart in any realistic pool.
    pub fn short(&self) -> String {
        let mut s = String::with_capacity(8);
        for byte in &self.0[..4] {
            s.push_str(&format!("{:02x}", byte));
        }
        s
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_all_zero_bytes() {
        assert_eq!(Hash::zero().as_slice(), &[0u8; HASH_LEN]);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Hash::from_slice(&[1u8; 31]).is_none());
        assert!(Hash::from_slice(&[1u8; 33]).is_none());
        assert!(Hash::from_slice(&[1u8; 32]).is_some());
    }

    #[test]
    fn sha3_is_deterministic() {
        let a = Hash::sha3(b"peer-1");
        let b = Hash::sha3(b"peer-1");
        let c = Hash::sha3(b"peer-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_is_lowercase_hex() {
        let hash = Hash::from_slice(&[0xABu8; 32]).unwrap();
        assert_eq!(format!("{}", hash), "ab".repeat(32));
    }

    #[test]
    fn short_is_first_four_bytes() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xDE;
        bytes[1] = 0xAD;
        bytes[2] = 0xBE;
        bytes[3] = 0xEF;
        assert_eq!(Hash(bytes).short(), "deadbeef");
    }
}
