//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Nonce
//! challenges and cached secrets survive service restarts, which is what
//! makes the 10-day validity window meaningful across deployments.

use std::{path::Path, sync::Arc};

use keyfold_core::room::{NonceChallenge, RoomId};
use redb::{Database, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};

use super::{Storage, StorageError, StoredSecret};

/// Table: nonces
/// Key: room id (UTF-8 bytes)
/// Value: CBOR-encoded NonceChallenge
const NONCES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("nonces");

/// Table: secrets
/// Key: room id (UTF-8 bytes)
/// Value: CBOR-encoded StoredSecret
const SECRETS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("secrets");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the NONCES and SECRETS tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(NONCES).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(SECRETS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn store<V: Serialize>(
        &self,
        table: TableDefinition<&'static [u8], &'static [u8]>,
        room: &RoomId,
        value: &V,
    ) -> Result<(), StorageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(table).map_err(|e| StorageError::Io(e.to_string()))?;
            table
                .insert(room.0.as_bytes(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn load<V: DeserializeOwned>(
        &self,
        table: TableDefinition<&'static [u8], &'static [u8]>,
        room: &RoomId,
    ) -> Result<Option<V>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(table).map_err(|e| StorageError::Io(e.to_string()))?;

        match table.get(room.0.as_bytes()).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => {
                let decoded = ciborium::from_reader(value.value())
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(decoded))
            },
            None => Ok(None),
        }
    }
}

impl Storage for RedbStorage {
    fn store_nonce(&self, room: &RoomId, challenge: &NonceChallenge) -> Result<(), StorageError> {
        self.store(NONCES, room, challenge)
    }

    fn load_nonce(&self, room: &RoomId) -> Result<Option<NonceChallenge>, StorageError> {
        self.load(NONCES, room)
    }

    fn store_secret(&self, room: &RoomId, record: &StoredSecret) -> Result<(), StorageError> {
        self.store(SECRETS, room, record)
    }

    fn load_secret(&self, room: &RoomId) -> Result<Option<StoredSecret>, StorageError> {
        self.load(SECRETS, room)
    }
}

#[cfg(test)]
mod tests {
    use keyfold_core::room::NONCE_SIZE;
    use keyfold_crypto::RoomSecret;
    use tempfile::tempdir;

    use super::*;

    fn challenge(fill: u8, generation: u64) -> NonceChallenge {
        NonceChallenge {
            nonce: [fill; NONCE_SIZE],
            membership_generation: generation,
            created_at_secs: 42,
        }
    }

    #[test]
    fn nonce_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();
        let room = RoomId::from("1");

        assert!(storage.load_nonce(&room).unwrap().is_none());
        storage.store_nonce(&room, &challenge(1, 2)).unwrap();
        assert_eq!(storage.load_nonce(&room).unwrap(), Some(challenge(1, 2)));
    }

    #[test]
    fn nonce_overwrite_is_last_write_wins() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();
        let room = RoomId::from("1");

        storage.store_nonce(&room, &challenge(1, 2)).unwrap();
        storage.store_nonce(&room, &challenge(9, 3)).unwrap();
        assert_eq!(storage.load_nonce(&room).unwrap(), Some(challenge(9, 3)));
    }

    #[test]
    fn secret_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();
        let room = RoomId::from("1");
        let record = StoredSecret { secret: RoomSecret::new([7; 32], 3), created_at_secs: 100 };

        storage.store_secret(&room, &record).unwrap();
        assert_eq!(storage.load_secret(&room).unwrap(), Some(record));
    }

    #[test]
    fn state_survives_reopening() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let room = RoomId::from("1");

        {
            let storage = RedbStorage::open(&path).unwrap();
            storage.store_nonce(&room, &challenge(1, 2)).unwrap();
        }

        let reopened = RedbStorage::open(&path).unwrap();
        assert_eq!(reopened.load_nonce(&room).unwrap(), Some(challenge(1, 2)));
    }
}
