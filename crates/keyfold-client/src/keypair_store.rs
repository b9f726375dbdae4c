//! Encrypted persistence of the device's long-term key pair.
//!
//! The private scalar is stored encrypted under a passphrase-derived key
//! (PBKDF2, 100,000 iterations, SHA-256, random salt, AES-256-GCM); the
//! public key is stored in the clear alongside it. A key pair is created on
//! first use and never regenerated while a valid record exists.

use keyfold_core::env::Environment;
use keyfold_crypto::{KeyPair, kdf};
use serde::{Deserialize, Serialize};

use crate::{
    error::ClientError,
    local_store::{KEY_PAIR_RECORD, LocalStore, StoreError},
};

/// Persisted key-pair record.
#[derive(Serialize, Deserialize)]
struct KeyPairRecord {
    salt: [u8; kdf::SALT_SIZE],
    nonce: [u8; kdf::RECORD_NONCE_SIZE],
    encrypted_private_key: Vec<u8>,
    public_key: Vec<u8>,
}

/// Loads, creates, and persists the device key pair.
pub struct KeyPairStore<S, E> {
    store: S,
    env: E,
}

impl<S: LocalStore, E: Environment> KeyPairStore<S, E> {
    /// Create a store over the given local storage and environment.
    pub fn new(store: S, env: E) -> Self {
        Self { store, env }
    }

    /// Load the device key pair, creating one if none exists.
    ///
    /// # Errors
    ///
    /// - [`ClientError::DecryptionFailed`] if a record exists but the
    ///   passphrase does not decrypt it. Callers must surface this
    ///   distinctly from "no key pair yet" and must not retry silently.
    pub fn get_or_create(&self, passphrase: &str) -> Result<KeyPair, ClientError> {
        match self.store.load(KEY_PAIR_RECORD)? {
            Some(bytes) => self.unlock(&bytes, passphrase),
            None => self.create(passphrase),
        }
    }

    /// Whether a key-pair record exists on this device.
    pub fn has_key_pair(&self) -> Result<bool, ClientError> {
        Ok(self.store.load(KEY_PAIR_RECORD)?.is_some())
    }

    fn unlock(&self, record_bytes: &[u8], passphrase: &str) -> Result<KeyPair, ClientError> {
        let record: KeyPairRecord = ciborium::de::from_reader(record_bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let key = kdf::derive_passphrase_key(passphrase, &record.salt);
        let private_bytes = kdf::open_record(&key, &record.nonce, &record.encrypted_private_key)
            .map_err(|_| ClientError::DecryptionFailed)?;

        let mut scalar = [0u8; 32];
        if private_bytes.len() != scalar.len() {
            return Err(ClientError::Protocol("key-pair record has a malformed scalar".into()));
        }
        scalar.copy_from_slice(&private_bytes);

        KeyPair::from_secret_bytes(&scalar)
            .map_err(|_| ClientError::Protocol("key-pair record holds an invalid scalar".into()))
    }

    fn create(&self, passphrase: &str) -> Result<KeyPair, ClientError> {
        // A seed reducing to zero is rejected by from_seed; redraw
        let pair = loop {
            if let Ok(pair) = KeyPair::from_seed(self.env.random_array()) {
                break pair;
            }
        };

        let salt: [u8; kdf::SALT_SIZE] = self.env.random_array();
        let nonce: [u8; kdf::RECORD_NONCE_SIZE] = self.env.random_array();
        let key = kdf::derive_passphrase_key(passphrase, &salt);
        let encrypted_private_key = kdf::seal_record(&key, nonce, pair.secret_bytes().as_slice());

        let record = KeyPairRecord {
            salt,
            nonce,
            encrypted_private_key,
            public_key: pair.public().to_bytes().to_vec(),
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&record, &mut bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.store(KEY_PAIR_RECORD, &bytes)?;

        tracing::debug!("generated and persisted a new device key pair");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use keyfold_core::env::TestEnv;

    use super::*;
    use crate::local_store::MemoryLocalStore;

    fn store() -> KeyPairStore<MemoryLocalStore, TestEnv> {
        KeyPairStore::new(MemoryLocalStore::new(), TestEnv::new(42))
    }

    #[test]
    fn first_use_creates_a_pair() {
        let store = store();
        assert!(!store.has_key_pair().unwrap());
        let pair = store.get_or_create("passphrase").unwrap();
        assert!(store.has_key_pair().unwrap());
        assert_eq!(pair.public().to_bytes().len(), 33);
    }

    #[test]
    fn same_passphrase_reloads_the_same_pair() {
        let store = store();
        let created = store.get_or_create("passphrase").unwrap();
        let reloaded = store.get_or_create("passphrase").unwrap();
        assert_eq!(created.public(), reloaded.public());
    }

    #[test]
    fn wrong_passphrase_is_a_distinct_error() {
        let store = store();
        let _ = store.get_or_create("passphrase").unwrap();
        let result = store.get_or_create("wrong");
        assert!(matches!(result, Err(ClientError::DecryptionFailed)));
        // The record survives: the right passphrase still works
        assert!(store.get_or_create("passphrase").is_ok());
    }

    #[test]
    fn separate_devices_get_separate_pairs() {
        let a = KeyPairStore::new(MemoryLocalStore::new(), TestEnv::new(1));
        let b = KeyPairStore::new(MemoryLocalStore::new(), TestEnv::new(2));
        let pair_a = a.get_or_create("pw").unwrap();
        let pair_b = b.get_or_create("pw").unwrap();
        assert_ne!(pair_a.public(), pair_b.public());
    }
}
