//! Passphrase key derivation and symmetric record sealing.
//!
//! Backs the encrypted key-pair record: a PBKDF2-derived AES key encrypts
//! the private scalar at rest (100,000 iterations of PBKDF2-HMAC-SHA256
//! over a random 16-byte salt).

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit, generic_array::GenericArray},
};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Size of the KDF salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Size of the record AEAD nonce in bytes.
pub const RECORD_NONCE_SIZE: usize = 12;

/// Derive a 256-bit AES key from a passphrase and salt.
pub fn derive_passphrase_key(passphrase: &str, salt: &[u8; SALT_SIZE]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, key.as_mut_slice());
    key
}

/// Encrypt a record under a derived key with AES-256-GCM.
///
/// Returns ciphertext with the tag appended. The caller provides a fresh
/// random nonce and stores it alongside the ciphertext.
pub fn seal_record(key: &[u8; 32], nonce: [u8; RECORD_NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    let Ok(sealed) = cipher.encrypt(GenericArray::from_slice(&nonce), plaintext) else {
        unreachable!("AES-256-GCM encryption cannot fail with valid inputs")
    };
    sealed
}

/// Decrypt a record sealed with [`seal_record`].
///
/// # Errors
///
/// - [`CryptoError::AuthenticationFailed`] on tag mismatch. For the
///   key-pair record this means a wrong passphrase.
pub fn open_record(
    key: &[u8; 32],
    nonce: &[u8; RECORD_NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_passphrase_and_salt_derive_same_key() {
        let salt = [0x11; SALT_SIZE];
        let a = derive_passphrase_key("correct horse", &salt);
        let b = derive_passphrase_key("correct horse", &salt);
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = derive_passphrase_key("correct horse", &[0x11; SALT_SIZE]);
        let b = derive_passphrase_key("correct horse", &[0x22; SALT_SIZE]);
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn record_roundtrip() {
        let key = derive_passphrase_key("pw", &[0x01; SALT_SIZE]);
        let sealed = seal_record(&key, [0x02; RECORD_NONCE_SIZE], b"private scalar");
        let opened = open_record(&key, &[0x02; RECORD_NONCE_SIZE], &sealed).unwrap();
        assert_eq!(opened, b"private scalar");
    }

    #[test]
    fn wrong_passphrase_fails_authentication() {
        let key = derive_passphrase_key("pw", &[0x01; SALT_SIZE]);
        let sealed = seal_record(&key, [0x02; RECORD_NONCE_SIZE], b"private scalar");

        let wrong = derive_passphrase_key("pw2", &[0x01; SALT_SIZE]);
        let result = open_record(&wrong, &[0x02; RECORD_NONCE_SIZE], &sealed);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }
}
