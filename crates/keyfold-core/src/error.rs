//! Shared error types.
//!
//! Strongly-typed errors per layer. Nothing here is process-fatal; every
//! error is scoped to the room or message operation in progress. The only
//! retryable class is [`Unavailable`]: a collaborator (ledger, content
//! store, negotiation service) that could not be reached. Protocol and
//! authorization failures are never retried as-is.

use thiserror::Error;

/// A collaborator could not be reached or did not answer.
///
/// Safe to retry with backoff at the caller's discretion; callers impose
/// their own timeouts on the underlying network calls and surface them as
/// this error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("collaborator unavailable: {reason}")]
pub struct Unavailable {
    /// Human-readable description of the failure.
    pub reason: String,
}

impl Unavailable {
    /// Build from anything displayable.
    pub fn new(reason: impl std::fmt::Display) -> Self {
        Self { reason: reason.to_string() }
    }
}

/// Authorization failures of the negotiation protocol.
///
/// Reported to the caller as access-denied. Never retried with the same
/// nonce; the client must restart from the challenge step.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The caller is not a room member, or the supplied public key does not
    /// match the ledger record. The two cases are deliberately not
    /// distinguishable.
    #[error("membership or key mismatch")]
    MembershipOrKeyMismatch,

    /// The submitted challenge answer did not verify against the stored
    /// nonce (stale after rotation, wrong key, or malformed).
    #[error("invalid nonce")]
    InvalidNonce,

    /// No challenge exists for the room; the challenge step was skipped.
    #[error("nonce not found for this room")]
    NonceNotFound,
}

impl DenialReason {
    /// HTTP status a transport adapter should map this denial to.
    pub fn http_status(self) -> u16 {
        match self {
            Self::MembershipOrKeyMismatch | Self::InvalidNonce => 403,
            Self::NonceNotFound => 404,
        }
    }
}
