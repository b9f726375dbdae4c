//! Per-room history of derived room secrets.
//!
//! An append-only stack, most-recently-derived last, plus the member-key
//! snapshot the top entry was computed against. Decryption walks the stack
//! newest-first without mutating it; rotation always pushes, never edits.
//! Exclusively owned by the local session for one room, never shared
//! across devices, only independently re-derived by each.

use keyfold_core::PublicKeySet;
use keyfold_crypto::RoomSecret;
use serde::{Deserialize, Serialize};

/// Ordered cache of a room's previously valid secrets.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SecretHistory {
    /// Secrets oldest to newest.
    secrets: Vec<RoomSecret>,
    /// Compressed member-key encodings of the snapshot behind the top entry.
    snapshot: Vec<Vec<u8>>,
}

impl SecretHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// The newest secret. `None` only before the room is first entered.
    pub fn current(&self) -> Option<&RoomSecret> {
        self.secrets.last()
    }

    /// Number of cached secrets.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// True if no secret has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Secrets newest first, for trial decryption.
    ///
    /// Non-mutating: the persisted stack order is unchanged by traversal.
    pub fn newest_first(&self) -> impl Iterator<Item = &RoomSecret> {
        self.secrets.iter().rev()
    }

    /// Push a freshly derived secret and the snapshot it came from.
    ///
    /// Idempotent when the top entry already holds the same secret: two
    /// rotations for an unchanged member set must not produce duplicate
    /// entries. A different secret always pushes, even at an unchanged
    /// generation; an equal-count member swap changes the secret but not
    /// the member count.
    pub fn push(&mut self, secret: RoomSecret, members: &PublicKeySet) {
        self.snapshot = members.iter().map(|key| key.to_bytes().to_vec()).collect();

        if self.current().is_some_and(|top| *top == secret) {
            tracing::debug!(
                generation = secret.membership_generation(),
                "skipping duplicate secret for unchanged membership"
            );
            return;
        }
        self.secrets.push(secret);
    }

    /// Whether `members` equals the snapshot behind the top entry.
    ///
    /// False for an empty history: the first message in a room always
    /// triggers a derivation.
    pub fn snapshot_matches(&self, members: &PublicKeySet) -> bool {
        if self.secrets.is_empty() {
            return false;
        }
        if self.snapshot.len() != members.len() {
            return false;
        }
        members
            .iter()
            .zip(self.snapshot.iter())
            .all(|(key, stored)| key.to_bytes().as_slice() == stored.as_slice())
    }
}
