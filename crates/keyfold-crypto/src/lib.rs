//! Keyfold Cryptographic Primitives
//!
//! Cryptographic building blocks for the Keyfold room-secret protocol.
//! Pure functions with deterministic outputs. Callers provide random bytes
//! (seeds, IVs, nonces) for deterministic testing.
//!
//! # Key Lifecycle
//!
//! Each device holds one long-term secp256k1 key pair. A room's member
//! public keys fold into a single shared scalar product, hashed into the
//! room secret; the secret keys the AES-256-GCM envelope codec applied to
//! every private-room message.
//!
//! ```text
//! Member Key Pairs
//!        │
//!        ▼
//! Aggregation Fold → Room Secret (per membership generation)
//!        │
//!        ▼
//! SHA-256 → Symmetric Key
//!        │
//!        ▼
//! AES-256-GCM → Encrypted Envelope
//! ```
//!
//! Nonces and secrets in transit between a member and the distribution
//! service travel in [sealed boxes](sealed): ephemeral-static ECDH with an
//! AEAD, never an unauthenticated transit cipher.
//!
//! # Security
//!
//! - Every member of a room derives the identical secret from the same
//!   membership snapshot; a key pair outside the snapshot derives a
//!   different one and fails envelope authentication.
//! - Envelope and sealed-box failures are uniform
//!   ([`CryptoError::AuthenticationFailed`] / [`CryptoError::OpenFailed`])
//!   and carry no oracle-usable detail.
//! - Private scalars, derived keys, and room secrets zeroize on drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aggregate;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod sealed;

pub use aggregate::{PublicKeySet, RoomSecret, aggregate, aggregate_members};
pub use envelope::{EncryptedEnvelope, IV_SIZE, TAG_SIZE, decrypt, encrypt};
pub use error::CryptoError;
pub use keys::{KeyPair, MemberPublicKey, PUBLIC_KEY_SIZE, SIGNATURE_SIZE, verify_signature};
pub use sealed::{SEAL_NONCE_SIZE, SEALED_OVERHEAD, open, seal};
