//! Keyfold protocol core.
//!
//! Shared domain types and collaborator seams for the Keyfold secure
//! group-messaging subsystem: room and member identifiers, the environment
//! abstraction, the ledger and content-store traits, the negotiation wire
//! payloads, and the shared error taxonomy. Cryptographic types come from
//! `keyfold-crypto` and are re-exported where they are part of this crate's
//! vocabulary.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod oracle;
pub mod room;
pub mod wire;

pub use env::Environment;
pub use error::{DenialReason, Unavailable};
pub use keyfold_crypto::{PublicKeySet, RoomSecret};
pub use oracle::{ContentStore, MembershipOracle};
pub use room::{ContentId, MemberId, NONCE_SIZE, NonceChallenge, RoomId};
