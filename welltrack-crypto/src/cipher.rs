//! Field sealing using ChaCha20-Poly1305.
//!
//! Provides authenticated encryption plus the JSON envelope a sealed
//! attribute takes on the wire.

use crate::error::{CryptoError, CryptoResult};
use crate::key::FieldKey;
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encrypted bytes with the nonce needed to open them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedData {
    /// The nonce used for encryption (unique per encryption).
    pub nonce: [u8; NONCE_SIZE],
    /// The encrypted ciphertext (includes auth tag).
    pub ciphertext: Vec<u8>,
}

/// Encrypts plaintext with a fresh random nonce.
pub fn encrypt(key: &FieldKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts data produced by [`encrypt`] with the same key.
pub fn decrypt(key: &FieldKey, encrypted: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, encrypted.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Decryption("decryption failed (wrong key or tampered data)".to_string())
        })
}

/// Wire envelope for one sealed attribute.
///
/// Serializes as `{"encrypted": "...", "iv": "...", "isEncrypted": true}`,
/// the shape the backend and older clients already store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedField {
    /// Base64 ciphertext including the auth tag.
    pub encrypted: String,
    /// Base64 nonce.
    pub iv: String,
    /// Always true for a sealed value.
    pub is_encrypted: bool,
}

impl SealedField {
    /// Seals a JSON value. The plaintext is the value's JSON encoding, so
    /// numbers, strings and nested objects all round-trip exactly.
    pub fn seal(key: &FieldKey, value: &serde_json::Value) -> CryptoResult<Self> {
        let plaintext = serde_json::to_vec(value)?;
        let encrypted = encrypt(key, &plaintext)?;
        Ok(Self {
            encrypted: STANDARD.encode(&encrypted.ciphertext),
            iv: STANDARD.encode(encrypted.nonce),
            is_encrypted: true,
        })
    }

    /// Opens the envelope and parses the original JSON value.
    pub fn open(&self, key: &FieldKey) -> CryptoResult<serde_json::Value> {
        if !self.is_encrypted {
            return Err(CryptoError::Decryption("envelope not marked encrypted".into()));
        }

        let nonce_bytes = STANDARD
            .decode(&self.iv)
            .map_err(|e| CryptoError::Decryption(format!("invalid base64 iv: {e}")))?;
        let nonce: [u8; NONCE_SIZE] = nonce_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::Decryption(format!(
                "invalid nonce length: expected {NONCE_SIZE}, got {}",
                nonce_bytes.len()
            ))
        })?;

        let ciphertext = STANDARD
            .decode(&self.encrypted)
            .map_err(|e| CryptoError::Decryption(format!("invalid base64 ciphertext: {e}")))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::Decryption("data too short".to_string()));
        }

        let plaintext = decrypt(key, &EncryptedData { nonce, ciphertext })?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Reads an envelope out of an attribute value, if it is one.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Converts the envelope into an attribute value.
    pub fn to_value(&self) -> CryptoResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
