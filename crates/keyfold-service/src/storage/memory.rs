//! In-memory storage implementation for tests and simulation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use keyfold_core::room::{NonceChallenge, RoomId};

use super::{Storage, StorageError, StoredSecret};

/// In-memory storage over shared hash maps.
///
/// Clones share the same underlying maps. State does not survive the
/// process; use [`RedbStorage`](super::RedbStorage) for durability.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    nonces: HashMap<RoomId, NonceChallenge>,
    secrets: HashMap<RoomId, StoredSecret>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::Io("poisoned".into()))
    }
}

impl Storage for MemoryStorage {
    fn store_nonce(&self, room: &RoomId, challenge: &NonceChallenge) -> Result<(), StorageError> {
        self.lock()?.nonces.insert(room.clone(), challenge.clone());
        Ok(())
    }

    fn load_nonce(&self, room: &RoomId) -> Result<Option<NonceChallenge>, StorageError> {
        Ok(self.lock()?.nonces.get(room).cloned())
    }

    fn store_secret(&self, room: &RoomId, record: &StoredSecret) -> Result<(), StorageError> {
        self.lock()?.secrets.insert(room.clone(), record.clone());
        Ok(())
    }

    fn load_secret(&self, room: &RoomId) -> Result<Option<StoredSecret>, StorageError> {
        Ok(self.lock()?.secrets.get(room).cloned())
    }
}

#[cfg(test)]
mod tests {
    use keyfold_core::room::NONCE_SIZE;
    use keyfold_crypto::RoomSecret;

    use super::*;

    fn challenge(fill: u8, generation: u64) -> NonceChallenge {
        NonceChallenge {
            nonce: [fill; NONCE_SIZE],
            membership_generation: generation,
            created_at_secs: 0,
        }
    }

    #[test]
    fn absent_records_are_none() {
        let storage = MemoryStorage::new();
        let room = RoomId::from("1");
        assert_eq!(storage.load_nonce(&room).unwrap(), None);
        assert_eq!(storage.load_secret(&room).unwrap(), None);
    }

    #[test]
    fn nonce_roundtrip_and_overwrite() {
        let storage = MemoryStorage::new();
        let room = RoomId::from("1");

        storage.store_nonce(&room, &challenge(1, 2)).unwrap();
        assert_eq!(storage.load_nonce(&room).unwrap(), Some(challenge(1, 2)));

        // Last write wins
        storage.store_nonce(&room, &challenge(2, 3)).unwrap();
        assert_eq!(storage.load_nonce(&room).unwrap(), Some(challenge(2, 3)));
    }

    #[test]
    fn secret_roundtrip() {
        let storage = MemoryStorage::new();
        let room = RoomId::from("1");
        let record = StoredSecret { secret: RoomSecret::new([7; 32], 3), created_at_secs: 100 };

        storage.store_secret(&room, &record).unwrap();
        assert_eq!(storage.load_secret(&room).unwrap(), Some(record));
    }

    #[test]
    fn rooms_are_isolated() {
        let storage = MemoryStorage::new();
        storage.store_nonce(&RoomId::from("1"), &challenge(1, 2)).unwrap();
        assert_eq!(storage.load_nonce(&RoomId::from("2")).unwrap(), None);
    }

    #[test]
    fn clones_share_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();
        storage.store_nonce(&RoomId::from("1"), &challenge(1, 2)).unwrap();
        assert!(clone.load_nonce(&RoomId::from("1")).unwrap().is_some());
    }
}
