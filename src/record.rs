use crate::crypto::SALT_LEN;
use crate::error::VaultError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One encrypted submission, addressed by its code.
///
/// Immutable once created; the only way to change a record is to delete it
/// and encrypt again. The serde representation is the durable format: binary
/// fields as base64 text, the secret as plain text, `created_at` as a string.
#[derive(Serialize, Deserialize, Debug)]
pub struct Record {
    #[serde(with = "b64")]
    ciphertext: Vec<u8>,
    #[serde(with = "b64_salt")]
    salt: [u8; SALT_LEN],
    secret: String,
    created_at: String,
}

impl Record {
    pub(crate) fn new(ciphertext: Vec<u8>, salt: [u8; SALT_LEN], secret: String) -> Self {
        Self {
            ciphertext,
            salt,
            secret,
            created_at: Local::now().to_string(),
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }
}

/// The in-memory mapping code -> record.
///
/// Serializes transparently, so the durable file is exactly one JSON object
/// keyed by code. No ordering between records is guaranteed.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(transparent)]
pub struct Vault {
    records: HashMap<String, Record>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record. Fails if the code is already taken; existing records
    /// are never overwritten.
    pub fn put(&mut self, code: &str, record: Record) -> Result<(), VaultError> {
        if self.records.contains_key(code) {
            Err(VaultError::DuplicateCode(code.to_string()))
        } else {
            self.records.insert(code.to_string(), record);
            Ok(())
        }
    }

    pub fn get(&self, code: &str) -> Option<&Record> {
        self.records.get(code)
    }

    /// Removes a record, returning whether it existed.
    pub fn delete(&mut self, code: &str) -> bool {
        self.records.remove(code).is_some()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.records.contains_key(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

mod b64 {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(&text).map_err(Error::custom)
    }
}

mod b64_salt {
    use crate::crypto::SALT_LEN;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        salt: &[u8; SALT_LEN],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(salt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; SALT_LEN], D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = STANDARD.decode(&text).map_err(Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| Error::custom("salt must be 16 bytes"))
    }
}
