//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors from the cryptographic primitives.
///
/// Authentication failures deliberately carry no detail about where the
/// decryption went wrong, so they cannot be used as a padding or tag oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Seed bytes reduced to the zero scalar (never a valid private key).
    #[error("seed reduces to an invalid private scalar")]
    InvalidSeed,

    /// Bytes are not a valid compressed secp256k1 point.
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    /// Aggregation was asked to run over an empty member set.
    #[error("cannot aggregate over an empty member set")]
    NoMembers,

    /// AEAD tag verification failed or the ciphertext was malformed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Sealed-box output could not be produced for this recipient.
    #[error("sealing toward recipient failed")]
    SealFailed,

    /// Sealed-box input was malformed or not addressed to this key pair.
    #[error("opening sealed box failed")]
    OpenFailed,

    /// Signature bytes could not be parsed.
    #[error("invalid signature encoding")]
    InvalidSignature,

    /// Signature parsed but did not verify over the given message.
    #[error("signature verification failed")]
    SignatureMismatch,
}
