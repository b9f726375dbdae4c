//! Error types for device-side operations.

use keyfold_core::error::Unavailable;
use thiserror::Error;

use crate::local_store::StoreError;

/// Errors from client-side protocol operations.
///
/// None of these are fatal to the session; each is scoped to the room or
/// message operation in progress. Only [`ClientError::Unavailable`] is
/// worth retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A key-pair record exists but the passphrase did not decrypt it.
    ///
    /// Surfaced as-is and never retried automatically, since silent retry would
    /// enable passphrase brute-forcing. Distinct from "no key pair yet",
    /// which silently creates one.
    #[error("key pair decryption failed: wrong passphrase")]
    DecryptionFailed,

    /// A message could not be decrypted with any known or freshly
    /// negotiated secret. The message is unreadable; the session continues.
    #[error("message decryption failed after exhausting secret history")]
    DecryptFailed,

    /// The negotiation service denied the request.
    #[error("negotiation denied ({status}): {message}")]
    AccessDenied {
        /// HTTP-shaped status the service mapped the denial to.
        status: u16,
        /// Denial reason as reported by the service.
        message: String,
    },

    /// A response or stored record was structurally invalid.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Local storage failed.
    #[error("local store error: {0}")]
    Storage(#[from] StoreError),

    /// A collaborator could not be reached; safe to retry with backoff.
    #[error(transparent)]
    Unavailable(#[from] Unavailable),
}

impl ClientError {
    /// Whether retrying the same operation can succeed without intervention.
    ///
    /// True only for [`ClientError::Unavailable`]; every other class needs a
    /// changed input (passphrase, membership, a fresh negotiation) first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
