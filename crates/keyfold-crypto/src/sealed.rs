//! Sealed boxes: authenticated public-key encryption toward a member key.
//!
//! ECIES construction: ephemeral-static ECDH on secp256k1, HKDF-SHA256 key
//! derivation bound to both public keys, AES-256-GCM. Used by the
//! negotiation protocol to move nonces and room secrets "encrypted toward"
//! a recipient without any shared state. The output is self-contained:
//!
//! ```text
//! ephemeral compressed point (33) ‖ nonce (12) ‖ ciphertext + tag
//! ```

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit, generic_array::GenericArray},
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    keys::{KeyPair, MemberPublicKey, PUBLIC_KEY_SIZE},
};

/// Size of the sealed-box AEAD nonce in bytes.
pub const SEAL_NONCE_SIZE: usize = 12;

/// Fixed overhead of a sealed box over its plaintext.
pub const SEALED_OVERHEAD: usize = PUBLIC_KEY_SIZE + SEAL_NONCE_SIZE + 16;

/// Domain-separation label for sealed-box key derivation.
const SEAL_LABEL: &[u8] = b"keyfoldSealedV1";

/// Seal a plaintext toward a recipient's public key.
///
/// `ephemeral_seed` becomes a one-shot key pair and MUST be fresh random
/// bytes per call; the ephemeral public point travels in the output.
///
/// # Errors
///
/// - [`CryptoError::SealFailed`] if the ephemeral seed is unusable
///   (reduces to zero; redraw and retry).
pub fn seal(
    recipient: &MemberPublicKey,
    plaintext: &[u8],
    ephemeral_seed: [u8; 32],
    nonce: [u8; SEAL_NONCE_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = KeyPair::from_seed(ephemeral_seed).map_err(|_| CryptoError::SealFailed)?;

    let shared = k256::ecdh::diffie_hellman(
        ephemeral.secret_scalar(),
        recipient.as_point().as_affine(),
    );
    let ephemeral_public = ephemeral.public().to_bytes();
    let key = derive_seal_key(
        shared.raw_secret_bytes().as_slice(),
        &ephemeral_public,
        &recipient.to_bytes(),
    );

    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_slice()));
    let sealed = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::SealFailed)?;

    let mut out = Vec::with_capacity(SEALED_OVERHEAD + plaintext.len());
    out.extend_from_slice(&ephemeral_public);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a sealed box with the recipient's key pair.
///
/// # Errors
///
/// - [`CryptoError::OpenFailed`] if the input is truncated, the ephemeral
///   point is malformed, or the tag does not verify (wrong recipient or
///   tampering). The cases are deliberately indistinguishable.
pub fn open(key_pair: &KeyPair, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < SEALED_OVERHEAD {
        return Err(CryptoError::OpenFailed);
    }

    let (ephemeral_public, rest) = sealed.split_at(PUBLIC_KEY_SIZE);
    let (nonce, ciphertext) = rest.split_at(SEAL_NONCE_SIZE);

    let ephemeral = MemberPublicKey::from_bytes(ephemeral_public)
        .map_err(|_| CryptoError::OpenFailed)?;

    let shared = k256::ecdh::diffie_hellman(
        key_pair.secret_scalar(),
        ephemeral.as_point().as_affine(),
    );
    let mut ephemeral_bytes = [0u8; PUBLIC_KEY_SIZE];
    ephemeral_bytes.copy_from_slice(ephemeral_public);
    let key = derive_seal_key(
        shared.raw_secret_bytes().as_slice(),
        &ephemeral_bytes,
        &key_pair.public().to_bytes(),
    );

    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_slice()));
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::OpenFailed)
}

/// HKDF-SHA256 over the ECDH x-coordinate, bound to both transcript keys.
fn derive_seal_key(
    shared: &[u8],
    ephemeral_public: &[u8; PUBLIC_KEY_SIZE],
    recipient_public: &[u8; PUBLIC_KEY_SIZE],
) -> Zeroizing<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(None, shared);

    let mut info = Vec::with_capacity(SEAL_LABEL.len() + 2 * PUBLIC_KEY_SIZE);
    info.extend_from_slice(SEAL_LABEL);
    info.extend_from_slice(ephemeral_public);
    info.extend_from_slice(recipient_public);

    let mut key = Zeroizing::new([0u8; 32]);
    let Ok(()) = hkdf.expand(&info, key.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length")
    };
    key
}
