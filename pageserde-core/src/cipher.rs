// In: src/cipher.rs

//! The spill cipher capability and its default AES-256-GCM implementation.
//!
//! A cipher owns its key and any nonce material. Strategies call it at most
//! once per direction per page and never look at its output format.

use std::fmt;
use std::sync::RwLock;

// aes-gcm relies on generic-array 0.14, so suppress the upstream deprecation locally.
#[allow(deprecated)]
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use rand::RngCore;

use crate::error::PagesSerdeError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

//==================================================================================
// 1. Capability Trait
//==================================================================================

pub trait SpillCipher: Send + Sync + fmt::Debug {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PagesSerdeError>;

    /// Fails with `CipherError` if the input was not produced by this key or
    /// has been altered.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, PagesSerdeError>;

    /// Discards the key material. Every later call fails.
    fn destroy(&self);
}

//==================================================================================
// 2. AES-256-GCM Implementation
//==================================================================================

/// Authenticated spill encryption with one random key per instance.
///
/// Output layout: `nonce (12) || ciphertext || tag (16)`, with a fresh random
/// nonce per call. The key never leaves the process, so spilled data is
/// unreadable once the cipher is destroyed.
pub struct AesSpillCipher {
    cipher: RwLock<Option<Aes256Gcm>>,
}

impl AesSpillCipher {
    /// Bytes added to every encrypted block.
    pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

    /// A cipher with a freshly generated key.
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        Self::with_key(&key)
    }

    /// A cipher over a caller-supplied key.
    pub fn with_key(key: &[u8; 32]) -> Self {
        Self {
            cipher: RwLock::new(Some(Aes256Gcm::new(key_ref(key)))),
        }
    }

    fn with_cipher<T>(
        &self,
        op: impl FnOnce(&Aes256Gcm) -> Result<T, PagesSerdeError>,
    ) -> Result<T, PagesSerdeError> {
        let guard = self
            .cipher
            .read()
            .map_err(|_| PagesSerdeError::CipherError("cipher lock poisoned".to_string()))?;
        match guard.as_ref() {
            Some(cipher) => op(cipher),
            None => Err(PagesSerdeError::CipherError(
                "cipher has been destroyed".to_string(),
            )),
        }
    }
}

impl Default for AesSpillCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AesSpillCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let destroyed = self.cipher.read().map(|c| c.is_none()).unwrap_or(true);
        f.debug_struct("AesSpillCipher")
            .field("destroyed", &destroyed)
            .finish_non_exhaustive()
    }
}

impl SpillCipher for AesSpillCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PagesSerdeError> {
        self.with_cipher(|cipher| {
            let mut nonce = [0u8; NONCE_LEN];
            rand::rng().fill_bytes(&mut nonce);

            let sealed = cipher
                .encrypt(nonce_ref(&nonce), plaintext)
                .map_err(|_| PagesSerdeError::CipherError("encryption failed".to_string()))?;

            let mut output = Vec::with_capacity(NONCE_LEN + sealed.len());
            output.extend_from_slice(&nonce);
            output.extend_from_slice(&sealed);
            Ok(output)
        })
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, PagesSerdeError> {
        if ciphertext.len() < Self::OVERHEAD {
            return Err(PagesSerdeError::CipherError(format!(
                "encrypted block of {} bytes is shorter than the {} byte nonce and tag",
                ciphertext.len(),
                Self::OVERHEAD
            )));
        }
        self.with_cipher(|cipher| {
            let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
            cipher.decrypt(nonce_ref(nonce), sealed).map_err(|_| {
                PagesSerdeError::CipherError(
                    "authentication failed: tampered payload or wrong key".to_string(),
                )
            })
        })
    }

    fn destroy(&self) {
        // A poisoned lock still holds the key; take it regardless.
        let mut guard = match self.cipher.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }
}

#[allow(deprecated)]
fn key_ref(bytes: &[u8; 32]) -> &aes_gcm::Key<Aes256Gcm> {
    GenericArray::from_slice(bytes)
}

#[allow(deprecated)]
fn nonce_ref(bytes: &[u8]) -> &aes_gcm::Nonce<<Aes256Gcm as aes_gcm::aead::AeadCore>::NonceSize> {
    GenericArray::from_slice(bytes)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = AesSpillCipher::new();
        let plaintext = b"spilled hash table partition".to_vec();

        let sealed = cipher.encrypt(&plaintext).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + AesSpillCipher::OVERHEAD);
        assert_ne!(&sealed[NONCE_LEN..NONCE_LEN + plaintext.len()], &plaintext[..]);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let cipher = AesSpillCipher::new();
        let a = cipher.encrypt(b"same input").unwrap();
        let b = cipher.encrypt(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampering_is_detected() {
        let cipher = AesSpillCipher::new();
        let mut sealed = cipher.encrypt(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            cipher.decrypt(&sealed),
            Err(PagesSerdeError::CipherError(_))
        ));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let writer = AesSpillCipher::with_key(&[1u8; 32]);
        let reader = AesSpillCipher::with_key(&[2u8; 32]);
        let sealed = writer.encrypt(b"payload").unwrap();
        assert!(matches!(
            reader.decrypt(&sealed),
            Err(PagesSerdeError::CipherError(_))
        ));
        assert_eq!(AesSpillCipher::with_key(&[1u8; 32]).decrypt(&sealed).unwrap(), b"payload");
    }

    #[test]
    fn test_short_input_is_rejected() {
        let cipher = AesSpillCipher::new();
        assert!(matches!(
            cipher.decrypt(&[0u8; 10]),
            Err(PagesSerdeError::CipherError(_))
        ));
    }

    #[test]
    fn test_destroyed_cipher_refuses_work() {
        let cipher = AesSpillCipher::new();
        let sealed = cipher.encrypt(b"payload").unwrap();
        cipher.destroy();

        assert!(matches!(cipher.encrypt(b"x"), Err(PagesSerdeError::CipherError(_))));
        assert!(matches!(cipher.decrypt(&sealed), Err(PagesSerdeError::CipherError(_))));
        assert!(format!("{:?}", cipher).contains("destroyed: true"));
    }
}
