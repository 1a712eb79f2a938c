//! Field-level encryption for WellTrack sync.
//!
//! Sensitive attributes of a record (health readings, notes, dosage details)
//! are sealed individually before the record leaves the device. Everything
//! else stays in plaintext so the backend can index and filter on it.
//!
//! - [`FieldKey`] is the device/user scoped secret, derived with Argon2id or
//!   generated at random
//! - [`encrypt`] / [`decrypt`] wrap ChaCha20-Poly1305
//! - [`SealedField`] is the wire envelope that replaces a sensitive value
//! - [`FieldEncryptor`] is the provider contract sync handlers call

mod cipher;
mod error;
mod fields;
mod key;

pub use cipher::{decrypt, encrypt, EncryptedData, SealedField, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use fields::{AttributeMap, FieldEncryptor, KeyedFieldEncryptor};
pub use key::{derive_key, generate_random_key, FieldKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
