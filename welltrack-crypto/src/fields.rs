//! Encryption provider contract for attribute maps.
//!
//! Sync handlers project a record into an [`AttributeMap`], hand it to a
//! `FieldEncryptor` together with the entity type's sensitive field names,
//! and rebuild the record from the result. Handlers never see key material.

use crate::cipher::SealedField;
use crate::error::{CryptoError, CryptoResult};
use crate::key::FieldKey;
use serde_json::Value;

/// A record projected into attribute name → JSON value.
pub type AttributeMap = serde_json::Map<String, Value>;

/// Seals and opens the listed fields of an attribute map.
///
/// Fields not in `fields` pass through untouched. Absent and `null` fields are
/// left as they are on both paths. Opening a listed field that does not hold a
/// sealed envelope is an error.
pub trait FieldEncryptor: Send + Sync {
    /// Replaces each listed field's value with its sealed envelope.
    fn encrypt_fields(&self, attributes: AttributeMap, fields: &[&str])
    -> CryptoResult<AttributeMap>;

    /// Replaces each listed field's envelope with the original value.
    fn decrypt_fields(&self, attributes: AttributeMap, fields: &[&str])
    -> CryptoResult<AttributeMap>;
}

/// `FieldEncryptor` backed by a single [`FieldKey`].
pub struct KeyedFieldEncryptor {
    key: FieldKey,
}

impl KeyedFieldEncryptor {
    pub fn new(key: FieldKey) -> Self {
        Self { key }
    }
}

impl std::fmt::Debug for KeyedFieldEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedFieldEncryptor").finish_non_exhaustive()
    }
}

impl FieldEncryptor for KeyedFieldEncryptor {
    fn encrypt_fields(
        &self,
        mut attributes: AttributeMap,
        fields: &[&str],
    ) -> CryptoResult<AttributeMap> {
        for field in fields {
            let Some(value) = attributes.get_mut(*field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            *value = SealedField::seal(&self.key, value)?.to_value()?;
        }
        Ok(attributes)
    }

    fn decrypt_fields(
        &self,
        mut attributes: AttributeMap,
        fields: &[&str],
    ) -> CryptoResult<AttributeMap> {
        for field in fields {
            let Some(value) = attributes.get_mut(*field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let sealed = SealedField::from_value(value).ok_or_else(|| CryptoError::NotCiphertext {
                field: (*field).to_string(),
            })?;
            *value = sealed.open(&self.key)?;
        }
        Ok(attributes)
    }
}
