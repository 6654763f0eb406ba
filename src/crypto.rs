//! Encryption at rest (C6): a ChaCha20-Poly1305 envelope over episode
//! text and tags. Key resolution priority lives in `memory::resolve_key`,
//! which owns the salt file I/O that picking a key involves. See spec
//! §4.6 and §6.4.

use crate::error::{EngramError, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha512;

const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// An encrypted field: nonce + ciphertext, both hex-encoded so the
/// envelope round-trips cleanly through JSON (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub nonce: String,
    pub ciphertext: String,
}

/// The resolved 256-bit encryption key plus whatever salt produced it
/// (only present when derived from a password).
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
    pub salt: Option<Vec<u8>>,
}

impl EncryptionKey {
    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.bytes))
    }

    /// Raw hex-encoded 32-byte key (priority 1 of §4.6's resolution order).
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| EngramError::PolicyError(format!("invalid hex key: {e}")))?;
        if bytes.len() != KEY_LEN {
            return Err(EngramError::PolicyError(format!(
                "key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; KEY_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self { bytes: arr, salt: None })
    }

    /// Derive from a password and salt via PBKDF2-HMAC-SHA512
    /// (priority 2). A fresh random salt is generated if `salt` is `None`.
    pub fn from_password(password: &str, salt: Option<Vec<u8>>) -> Self {
        let salt = salt.unwrap_or_else(|| {
            let mut s = vec![0u8; 16];
            rand::thread_rng().fill_bytes(&mut s);
            s
        });
        let mut bytes = [0u8; KEY_LEN];
        pbkdf2::<Hmac<Sha512>>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut bytes)
            .expect("pbkdf2 output length is valid for HMAC-SHA512");
        Self { bytes, salt: Some(salt) }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Envelope> {
        let cipher = self.cipher();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| EngramError::IntegrityFailure("encryption failed".to_string()))?;
        Ok(Envelope {
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        })
    }

    pub fn decrypt(&self, envelope: &Envelope) -> Result<String> {
        let cipher = self.cipher();
        let nonce_bytes = hex::decode(&envelope.nonce)
            .map_err(|e| EngramError::Malformed(format!("envelope nonce: {e}")))?;
        let ciphertext = hex::decode(&envelope.ciphertext)
            .map_err(|e| EngramError::Malformed(format!("envelope ciphertext: {e}")))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| EngramError::IntegrityFailure("decryption failed: bad key or tampered data".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|e| EngramError::IntegrityFailure(format!("decrypted data is not utf8: {e}")))
    }

    /// Encrypt `text` into a JSON-embeddable string (spec §4.6: the
    /// episode's `text` field becomes the serialized envelope, and
    /// `_encrypted` is flipped on the episode).
    pub fn encrypt_field(&self, plaintext: &str) -> Result<String> {
        let envelope = self.encrypt(plaintext)?;
        serde_json::to_string(&envelope)
            .map_err(|e| EngramError::Malformed(format!("serialize envelope: {e}")))
    }

    pub fn decrypt_field(&self, stored: &str) -> Result<String> {
        let envelope: Envelope = serde_json::from_str(stored)
            .map_err(|e| EngramError::Malformed(format!("deserialize envelope: {e}")))?;
        self.decrypt(&envelope)
    }

    /// Encrypt a tag list by joining with ` ` and treating the
    /// result as a single field (spec §4.6: tags are encrypted as one
    /// unit, not per-tag, so tag cardinality doesn't leak).
    pub fn encrypt_tags(&self, tags: &[String]) -> Result<String> {
        self.encrypt_field(&tags.join("\u{0}"))
    }

    pub fn decrypt_tags(&self, stored: &str) -> Result<Vec<String>> {
        let joined = self.decrypt_field(stored)?;
        if joined.is_empty() {
            return Ok(vec![]);
        }
        Ok(joined.split('\u{0}').map(str::to_string).collect())
    }
}
