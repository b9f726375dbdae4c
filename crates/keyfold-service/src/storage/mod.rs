//! Storage abstraction for the distribution service.
//!
//! Trait-based abstraction over the service's two per-room records: the
//! outstanding nonce challenge and the cached room secret. Both follow a
//! plain last-write-wins lifecycle with no cross-room coordination; the
//! trait is synchronous to keep the handler logic free of storage futures.

mod memory;
mod redb;

use keyfold_core::room::{NonceChallenge, RoomId};
use keyfold_crypto::RoomSecret;
pub use memory::MemoryStorage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::redb::RedbStorage;

/// Errors from service storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying storage failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A cached room secret with its creation time.
///
/// Served until `created_at_secs + validity window ≤ now`, after which it is
/// treated as absent and recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSecret {
    /// The cached secret.
    pub secret: RoomSecret,
    /// Unix timestamp (seconds) when the secret was computed.
    pub created_at_secs: u64,
}

/// Storage abstraction for nonce challenges and cached secrets.
///
/// Must be Clone (shared across handler invocations), Send + Sync, and
/// synchronous. Implementations typically share internal state via Arc, so
/// clones access the same underlying storage. Stores overwrite
/// unconditionally; last write wins.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Store the room's nonce challenge, overwriting any existing one.
    fn store_nonce(&self, room: &RoomId, challenge: &NonceChallenge) -> Result<(), StorageError>;

    /// Load the room's nonce challenge. `None` if no challenge was issued.
    fn load_nonce(&self, room: &RoomId) -> Result<Option<NonceChallenge>, StorageError>;

    /// Store the room's cached secret, overwriting any existing one.
    fn store_secret(&self, room: &RoomId, record: &StoredSecret) -> Result<(), StorageError>;

    /// Load the room's cached secret. `None` if none was computed yet.
    fn load_secret(&self, room: &RoomId) -> Result<Option<StoredSecret>, StorageError>;
}
