//! Long-term member key pairs on secp256k1.
//!
//! Key material is caller-seeded: generation takes 32 random bytes so the
//! same seed always produces the same pair, which keeps every operation in
//! this crate deterministic and testable.

use k256::{
    FieldBytes, NonZeroScalar, Scalar, SecretKey, U256,
    ecdsa::{
        Signature, SigningKey, VerifyingKey,
        signature::{Signer, Verifier},
    },
    elliptic_curve::{ops::Reduce, sec1::ToEncodedPoint},
};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Length of a compressed SEC1 public key encoding.
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Length of a serialized ECDSA signature (r ‖ s, fixed width).
pub const SIGNATURE_SIZE: usize = 64;

/// A member's public key as a point on secp256k1.
///
/// The canonical encoding is the compressed SEC1 form (33 bytes) and the
/// canonical ordering between keys is lexicographic on that encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberPublicKey(k256::PublicKey);

impl MemberPublicKey {
    /// Parse a compressed SEC1 encoding.
    ///
    /// Only the 33-byte compressed form is accepted; anything else is
    /// [`CryptoError::InvalidPublicKey`], including encodings that are the
    /// right length but not a point on the curve.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidPublicKey);
        }
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Compressed SEC1 encoding of this key.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let encoded = self.0.to_encoded_point(true);
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// The point's x-coordinate reduced modulo the curve order.
    ///
    /// This is the per-member term of the aggregation fold.
    pub(crate) fn x_scalar(&self) -> Scalar {
        let encoded = self.0.to_encoded_point(false);
        let Some(x) = encoded.x() else {
            unreachable!("a valid public key is never the identity point")
        };
        <Scalar as Reduce<U256>>::reduce_bytes(x)
    }

    pub(crate) fn as_point(&self) -> &k256::PublicKey {
        &self.0
    }
}

impl PartialOrd for MemberPublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemberPublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

/// A member's long-term key pair.
///
/// The private scalar zeroizes on drop. There is intentionally no `Debug`
/// implementation.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: MemberPublicKey,
}

impl KeyPair {
    /// Derive a key pair from 32 caller-provided random bytes.
    ///
    /// The seed is reduced modulo the curve order. A seed that reduces to
    /// zero is rejected with [`CryptoError::InvalidSeed`] (probability
    /// ~2^-128; callers simply draw a fresh seed).
    pub fn from_seed(mut seed: [u8; 32]) -> Result<Self, CryptoError> {
        let scalar = <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::from(seed));
        seed.zeroize();

        let nonzero: Option<NonZeroScalar> = NonZeroScalar::new(scalar).into();
        let nonzero = nonzero.ok_or(CryptoError::InvalidSeed)?;
        let secret = SecretKey::from(nonzero);
        let public = MemberPublicKey(secret.public_key());
        Ok(Self { secret, public })
    }

    /// Reconstruct a key pair from a previously exported private scalar.
    ///
    /// Unlike [`Self::from_seed`] no reduction is applied; the bytes must be
    /// a canonical non-zero scalar, which every exported key satisfies.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_bytes(&FieldBytes::from(*bytes))
            .map_err(|_| CryptoError::InvalidSeed)?;
        let public = MemberPublicKey(secret.public_key());
        Ok(Self { secret, public })
    }

    /// Export the private scalar for encrypted persistence.
    pub fn secret_bytes(&self) -> zeroize::Zeroizing<[u8; 32]> {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.secret.to_bytes());
        zeroize::Zeroizing::new(out)
    }

    /// This pair's public key.
    pub fn public(&self) -> &MemberPublicKey {
        &self.public
    }

    /// Sign a message with ECDSA over SHA-256.
    ///
    /// Used by the negotiation protocol to prove possession of the long-term
    /// key when answering a nonce challenge.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        let signing_key = SigningKey::from(&self.secret);
        let signature: Signature = signing_key.sign(message);
        let mut out = [0u8; SIGNATURE_SIZE];
        out.copy_from_slice(&signature.to_bytes());
        out
    }

    pub(crate) fn secret_scalar(&self) -> NonZeroScalar {
        self.secret.to_nonzero_scalar()
    }
}

/// Verify an ECDSA signature over a message.
///
/// Distinguishes malformed signature bytes ([`CryptoError::InvalidSignature`])
/// from a well-formed signature that does not verify
/// ([`CryptoError::SignatureMismatch`]); callers that must not leak the
/// difference collapse both.
pub fn verify_signature(
    public: &MemberPublicKey,
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> Result<(), CryptoError> {
    let signature =
        Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
    let verifying_key = VerifyingKey::from(*public.as_point());
    verifying_key
        .verify(message, &signature)
        .map_err(|_| CryptoError::SignatureMismatch)
}
