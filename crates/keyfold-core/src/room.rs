//! Room-scoped identifiers and negotiation records.

use serde::{Deserialize, Serialize};

/// Size of a challenge nonce in bytes.
pub const NONCE_SIZE: usize = 16;

/// Identifier of a room on the ledger.
///
/// Opaque to this core; the ledger assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A member's ledger address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identifier returned by the content store for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A nonce challenge held by the distribution service for one room.
///
/// Refreshed (overwritten, last-write-wins) whenever the observed membership
/// generation differs from the stored one; superseding is its only
/// destructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceChallenge {
    /// Random challenge value.
    pub nonce: [u8; NONCE_SIZE],
    /// Member-key count the challenge was minted against.
    pub membership_generation: u64,
    /// Creation time, seconds since the Unix epoch.
    pub created_at_secs: u64,
}
