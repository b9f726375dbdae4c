//! Local durable storage for device-side records.
//!
//! Opaque byte records keyed by well-known names: the encrypted key-pair
//! record and one secret-history record per room. The layout is an
//! implementation detail of the device, not a compatibility surface, so the
//! trait stays byte-oriented and synchronous.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use keyfold_core::room::RoomId;
use thiserror::Error;

/// Errors from local record storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying storage failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Well-known key of the device key-pair record.
pub const KEY_PAIR_RECORD: &str = "key-pair";

/// Well-known key of a room's secret-history record.
pub fn room_history_record(room: &RoomId) -> String {
    format!("room-{room}-state")
}

/// Byte-record storage on the local device.
///
/// Must be Clone (shared between stores), Send + Sync, and synchronous.
/// Implementations typically share internal state via Arc.
pub trait LocalStore: Clone + Send + Sync + 'static {
    /// Load a record. `None` if no record exists under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a record, overwriting any existing one.
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// In-memory implementation for tests and simulation.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryLocalStore {
    records: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryLocalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Io("poisoned".into()))?;
        Ok(records.get(key).cloned())
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Io("poisoned".into()))?;
        records.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}
