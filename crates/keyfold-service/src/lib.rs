//! Keyfold secret-distribution service.
//!
//! The helper that members negotiate with when they want the room secret
//! without computing it locally. Exposes the two negotiation handlers as
//! typed functions, challenge and secret, over a synchronous [`Storage`]
//! seam and the async ledger oracle; an outer transport layer binds them to
//! HTTP. State is two per-room records (nonce challenge, cached secret)
//! with last-write-wins semantics and a 10-day secret validity window.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod service;
pub mod storage;
pub mod system_env;

pub use service::{NegotiationService, SECRET_VALIDITY_SECS, ServiceError};
pub use storage::{MemoryStorage, RedbStorage, Storage, StorageError, StoredSecret};
pub use system_env::SystemEnv;
