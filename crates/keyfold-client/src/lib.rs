//! Device-side state for the Keyfold protocol.
//!
//! Everything a member's device keeps and drives locally:
//!
//! - [`KeyPairStore`]: the long-term key pair, persisted encrypted under a
//!   passphrase.
//! - [`SecretHistory`]: the per-room stack of previously valid room secrets
//!   that makes old messages decryptable after rotations.
//! - [`Negotiation`] / [`NegotiationClient`]: the challenge-response
//!   exchange that fetches the current room secret from the distribution
//!   service.
//! - [`RoomSession`]: the orchestrator applying the rotation and
//!   trial-decryption policies against the ledger and content store.
//!
//! Network transports are behind seams ([`NegotiationTransport`] here, the
//! oracle and content-store traits in `keyfold-core`); this crate performs
//! no I/O of its own beyond the injected [`LocalStore`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod keypair_store;
pub mod local_store;
pub mod negotiation;
pub mod secret_history;
pub mod session;

pub use error::ClientError;
pub use keypair_store::KeyPairStore;
pub use local_store::{LocalStore, MemoryLocalStore, StoreError};
pub use negotiation::{
    Negotiation, NegotiationClient, NegotiationState, NegotiationTransport, TransportError,
};
pub use secret_history::SecretHistory;
pub use session::{MessageText, RoomMessage, RoomSession};
