//! Value Encryption
//!
//! Symmetric encryption for stored values using AES-256 in CTR mode.
//!
//! ## Wire Layout
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────┐
//! │ nonce (16 bytes) │ ciphertext (len = plaintext) │
//! └──────────────────┴──────────────────────────────┘
//! ```
//!
//! A fresh random nonce is drawn for every call to [`Codec::encrypt`], so
//! encrypting the same plaintext twice yields different blobs.
//!
//! CTR mode provides confidentiality only. There is no authentication tag:
//! a corrupted or tampered blob decrypts to garbage without an error.

use crate::error::{StoreError, StoreResult};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the CTR nonce (initial counter block) in bytes.
pub const NONCE_SIZE: usize = 16;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Encrypts and decrypts opaque byte payloads with a fixed secret.
#[derive(Clone)]
pub struct Codec {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("key", &"[REDACTED]").finish()
    }
}

impl Codec {
    /// Creates a codec from a secret that must be exactly 32 bytes long.
    pub fn new(secret: &[u8]) -> StoreResult<Self> {
        if secret.len() != KEY_SIZE {
            return Err(StoreError::crypto(format!(
                "encryption key must be exactly {} bytes, got {}",
                KEY_SIZE,
                secret.len()
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(secret);
        Ok(Self { key })
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut out = Vec::with_capacity(NONCE_SIZE + plaintext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(plaintext);

        self.keystream(&nonce)?.apply_keystream(&mut out[NONCE_SIZE..]);
        Ok(out)
    }

    /// Decrypts a blob produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, blob: &[u8]) -> StoreResult<Vec<u8>> {
        if blob.len() < NONCE_SIZE {
            return Err(StoreError::crypto(format!(
                "encrypted data too short: {} bytes",
                blob.len()
            )));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
        let mut out = ciphertext.to_vec();
        self.keystream(nonce)?.apply_keystream(&mut out);
        Ok(out)
    }

    fn keystream(&self, nonce: &[u8]) -> StoreResult<Aes256Ctr> {
        Aes256Ctr::new_from_slices(&self.key, nonce)
            .map_err(|e| StoreError::crypto(format!("failed to initialize cipher: {}", e)))
    }
}
