//! Authenticated message envelopes using AES-256-GCM.
//!
//! The envelope is the unit persisted in the content store in place of
//! plaintext: a 16-byte IV, the ciphertext, and a detached 16-byte
//! authentication tag. The symmetric key is SHA-256 of the room secret's
//! value. All functions are pure; the caller provides the random IV.

use aes_gcm::{
    AesGcm,
    aead::{Aead, KeyInit, consts::U16, generic_array::GenericArray},
    aes::Aes256,
};
use serde::{Deserialize, Serialize};

use crate::{aggregate::RoomSecret, error::CryptoError};

/// Size of the envelope IV in bytes.
pub const IV_SIZE: usize = 16;

/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM instantiated with a 16-byte nonce to match the envelope IV.
type EnvelopeCipher = AesGcm<Aes256, U16>;

/// An encrypted message envelope.
///
/// Immutable once produced; exactly one envelope exists per plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Random per-message IV.
    pub iv: [u8; IV_SIZE],
    /// Ciphertext without the authentication tag.
    pub ciphertext: Vec<u8>,
    /// Detached GCM authentication tag.
    pub auth_tag: [u8; TAG_SIZE],
}

/// Encrypt a plaintext under a room secret.
///
/// The caller MUST provide a fresh cryptographically random IV per message;
/// reusing an IV under the same secret breaks GCM.
pub fn encrypt(secret: &RoomSecret, plaintext: &[u8], iv: [u8; IV_SIZE]) -> EncryptedEnvelope {
    let key = secret.symmetric_key();
    let cipher = EnvelopeCipher::new(GenericArray::from_slice(key.as_slice()));

    let Ok(mut sealed) = cipher.encrypt(GenericArray::from_slice(&iv), plaintext) else {
        unreachable!("AES-256-GCM encryption cannot fail with valid inputs")
    };

    let tag_start = sealed.len() - TAG_SIZE;
    let tag = sealed.split_off(tag_start);
    let mut auth_tag = [0u8; TAG_SIZE];
    auth_tag.copy_from_slice(&tag);

    EncryptedEnvelope { iv, ciphertext: sealed, auth_tag }
}

/// Decrypt an envelope under a room secret.
///
/// # Errors
///
/// - [`CryptoError::AuthenticationFailed`] if the tag does not verify, for
///   any reason: wrong secret, tampered ciphertext, tampered tag. The error
///   carries no further detail and is the signal that drives secret-history
///   rollback in the caller.
pub fn decrypt(secret: &RoomSecret, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CryptoError> {
    let key = secret.symmetric_key();
    let cipher = EnvelopeCipher::new(GenericArray::from_slice(key.as_slice()));

    let mut sealed = Vec::with_capacity(envelope.ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(&envelope.ciphertext);
    sealed.extend_from_slice(&envelope.auth_tag);

    cipher
        .decrypt(GenericArray::from_slice(&envelope.iv), sealed.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(fill: u8) -> RoomSecret {
        RoomSecret::new([fill; 32], 3)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let s = secret(1);
        let envelope = encrypt(&s, b"hello", [0xAB; IV_SIZE]);
        let plaintext = decrypt(&s, &envelope).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let s = secret(1);
        let envelope = encrypt(&s, b"", [0x00; IV_SIZE]);
        assert!(envelope.ciphertext.is_empty());
        assert_eq!(decrypt(&s, &envelope).unwrap(), b"");
    }

    #[test]
    fn wrong_secret_fails() {
        let envelope = encrypt(&secret(1), b"hello", [0x00; IV_SIZE]);
        let result = decrypt(&secret(2), &envelope);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let s = secret(1);
        let mut envelope = encrypt(&s, b"hello", [0x00; IV_SIZE]);
        envelope.ciphertext[0] ^= 0x01;
        assert_eq!(decrypt(&s, &envelope), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_tag_fails() {
        let s = secret(1);
        let mut envelope = encrypt(&s, b"hello", [0x00; IV_SIZE]);
        envelope.auth_tag[15] ^= 0x80;
        assert_eq!(decrypt(&s, &envelope), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_iv_fails() {
        let s = secret(1);
        let mut envelope = encrypt(&s, b"hello", [0x00; IV_SIZE]);
        envelope.iv[3] ^= 0xFF;
        assert_eq!(decrypt(&s, &envelope), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn different_ivs_produce_different_ciphertexts() {
        let s = secret(1);
        let a = encrypt(&s, b"hello", [0x00; IV_SIZE]);
        let b = encrypt(&s, b"hello", [0x01; IV_SIZE]);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tag_is_detached_from_ciphertext() {
        let s = secret(1);
        let envelope = encrypt(&s, b"twelve bytes", [0x00; IV_SIZE]);
        assert_eq!(envelope.ciphertext.len(), 12);
        assert_eq!(envelope.auth_tag.len(), TAG_SIZE);
    }
}
