mod code;
mod crypto;
mod error;
mod record;
mod storage;

pub use crate::crypto::KdfParams;
pub use crate::error::VaultError;
pub use crate::record::Record;
pub use crate::storage::Storage;

use crate::record::Vault;
use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use directories::ProjectDirs;
use getrandom::fill;
use zeroize::{Zeroize, Zeroizing};

/// How many codes to try before giving up on finding an unused one.
/// With >=129 bits per code a single retry is already vanishingly unlikely.
const MAX_CODE_ATTEMPTS: usize = 16;

/// The engine: encrypt text to a code, decrypt a code back to text.
///
/// Owns the durable store handle and the in-memory mapping; the mapping is
/// loaded once at open and flushed in full before every mutating call
/// returns. Single-threaded by design.
pub struct Encryptor {
    vault: Vault,
    storage: Storage,
    kdf: KdfParams,
}

impl Encryptor {
    /// Opens the vault at the platform default location.
    pub fn open() -> Result<Self> {
        Self::open_with_storage(default_storage()?)
    }

    /// Opens the vault at an explicit location. A missing file means an
    /// empty vault, not an error.
    pub fn open_with_storage(storage: Storage) -> Result<Self> {
        Self::open_with_storage_and_kdf(storage, KdfParams::default())
    }

    /// Opens with non-default KDF parameters. Records written under one set
    /// of parameters can only be decrypted under the same set.
    pub fn open_with_storage_and_kdf(storage: Storage, kdf: KdfParams) -> Result<Self> {
        let vault = match storage.load()? {
            Some(data) => serde_json::from_slice(&data)
                .context("failed to deserialize vault file; corrupted data")?,
            None => Vault::new(),
        };

        Ok(Self {
            vault,
            storage,
            kdf,
        })
    }

    /// Encrypts `plaintext` and returns the code that retrieves it.
    ///
    /// When `secret` is `None` a random 256-bit one is generated. The record
    /// is persisted before the code is returned; every returned code decrypts
    /// to exactly this plaintext until deleted.
    pub fn encrypt(&mut self, plaintext: &str, secret: Option<&str>) -> Result<String> {
        let secret = match secret {
            Some(s) => Zeroizing::new(s.to_string()),
            None => generate_secret()?,
        };

        let salt = crypto::generate_salt()?;
        let mut key = crypto::derive_key(&secret, &salt, self.kdf)
            .context("failed to derive encryption key")?;
        let sealed = crypto::seal(&key, plaintext.as_bytes());
        key.zeroize();

        let record = Record::new(sealed?, salt, secret.to_string());

        let code = self.unused_code()?;
        self.vault.put(&code, record)?;
        self.save()?;

        Ok(code)
    }

    /// Decrypts the record behind `code`.
    ///
    /// Returns `None` when the code is unknown, the stored ciphertext fails
    /// authentication, or the plaintext is not valid UTF-8. The reasons are
    /// deliberately not distinguished, so a caller holding a bad code learns
    /// nothing about why it failed.
    pub fn decrypt(&self, code: &str) -> Option<Zeroizing<String>> {
        let record = self.vault.get(code)?;

        let mut key = crypto::derive_key(record.secret(), record.salt(), self.kdf).ok()?;
        let opened = crypto::open(&key, record.ciphertext());
        key.zeroize();

        let plaintext = opened.ok()?;
        let text = String::from_utf8(plaintext.to_vec()).ok()?;
        Some(Zeroizing::new(text))
    }

    /// Deletes the record behind `code`, returning whether it existed.
    /// The deletion is persisted before returning.
    pub fn delete_code(&mut self, code: &str) -> Result<bool> {
        if self.vault.delete(code) {
            self.save()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// All stored codes, in no particular order.
    pub fn list_codes(&self) -> Vec<&String> {
        self.vault.codes().collect()
    }

    /// Generates a code that does not collide with any stored record.
    /// Collisions are retried internally and never surface to callers.
    fn unused_code(&self) -> Result<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = code::generate()?;
            if !self.vault.contains(&candidate) {
                return Ok(candidate);
            }
        }
        bail!("could not generate an unused code after {MAX_CODE_ATTEMPTS} attempts");
    }

    fn save(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.vault)?;
        self.storage.save(&data)
    }
}

/// Random secret with the entropy of a 256-bit token, base64url encoded.
fn generate_secret() -> Result<Zeroizing<String>> {
    let mut buf = Zeroizing::new([0u8; 32]);
    fill(&mut *buf).map_err(|_| anyhow::anyhow!("OS random generator unavailable"))?;
    Ok(Zeroizing::new(URL_SAFE_NO_PAD.encode(&*buf)))
}

/// Vault location under the platform data directory.
pub fn default_storage() -> Result<Storage> {
    let project_dirs =
        ProjectDirs::from("", "", "codevault").context("could not determine platform directories")?;

    Ok(Storage::new(project_dirs.data_dir().join("records.json")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fast_kdf() -> KdfParams {
        KdfParams::new(8, 1, 1).unwrap()
    }

    fn open_vault(storage: Storage) -> Encryptor {
        Encryptor::open_with_storage_and_kdf(storage, fast_kdf()).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let dir = tempdir().unwrap();
        let mut enc = open_vault(Storage::new(dir.path().join("vault.json")));

        let code = enc.encrypt("hello-world", None).unwrap();
        assert!(code.len() >= 20 && code.len() <= 30);

        let plaintext = enc.decrypt(&code).unwrap();
        assert_eq!(&*plaintext, "hello-world");
    }

    #[test]
    fn caller_supplied_secret_roundtrips() {
        let dir = tempdir().unwrap();
        let mut enc = open_vault(Storage::new(dir.path().join("vault.json")));

        let code = enc.encrypt("guarded", Some("hunter2")).unwrap();
        assert_eq!(&*enc.decrypt(&code).unwrap(), "guarded");
    }

    #[test]
    fn empty_and_unicode_plaintexts_roundtrip() {
        let dir = tempdir().unwrap();
        let mut enc = open_vault(Storage::new(dir.path().join("vault.json")));

        for text in ["", "héllo wörld 🔐", "line\nbreaks\tand tabs"] {
            let code = enc.encrypt(text, None).unwrap();
            assert_eq!(&*enc.decrypt(&code).unwrap(), text);
        }
    }

    #[test]
    fn codes_are_distinct_and_well_formed() {
        let dir = tempdir().unwrap();
        let mut enc = open_vault(Storage::new(dir.path().join("vault.json")));

        let mut codes = std::collections::HashSet::new();
        for i in 0..20 {
            let code = enc.encrypt(&format!("payload {i}"), None).unwrap();
            assert!(code.len() >= 20 && code.len() <= 30, "bad length: {code}");
            assert!(codes.insert(code), "duplicate code returned");
        }
        assert_eq!(enc.list_codes().len(), 20);
    }

    #[test]
    fn decrypt_unknown_code_returns_none() {
        let dir = tempdir().unwrap();
        let enc = open_vault(Storage::new(dir.path().join("vault.json")));

        assert!(enc.decrypt("nonexistent").is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut enc = open_vault(Storage::new(dir.path().join("vault.json")));

        let code = enc.encrypt("soon gone", None).unwrap();

        assert!(enc.delete_code(&code).unwrap());
        assert!(!enc.delete_code(&code).unwrap());
        assert!(!enc.delete_code("nonexistent").unwrap());
        assert!(enc.decrypt(&code).is_none());
    }

    #[test]
    fn records_survive_a_reopen() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));

        let code = {
            let mut enc = open_vault(storage.clone());
            enc.encrypt("durable", None).unwrap()
        };

        let enc = open_vault(storage);
        assert_eq!(&*enc.decrypt(&code).unwrap(), "durable");
    }

    #[test]
    fn deletions_survive_a_reopen() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));

        let code = {
            let mut enc = open_vault(storage.clone());
            let code = enc.encrypt("gone", None).unwrap();
            enc.delete_code(&code).unwrap();
            code
        };

        let enc = open_vault(storage);
        assert!(enc.decrypt(&code).is_none());
        assert!(enc.list_codes().is_empty());
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));

        let code = {
            let mut enc = open_vault(storage.clone());
            enc.encrypt("integrity matters", None).unwrap()
        };

        // flip one byte of the stored ciphertext on disk
        let raw = std::fs::read(storage.path()).unwrap();
        let mut json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        let field = json[&code]["ciphertext"].as_str().unwrap();
        let mut bytes = STANDARD.decode(field).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        json[&code]["ciphertext"] = STANDARD.encode(&bytes).into();
        std::fs::write(storage.path(), serde_json::to_vec(&json).unwrap()).unwrap();

        let enc = open_vault(storage);
        assert!(enc.decrypt(&code).is_none());
    }

    #[test]
    fn corrupted_vault_file_fails_to_open() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));
        std::fs::write(storage.path(), b"not json at all").unwrap();

        assert!(Encryptor::open_with_storage_and_kdf(storage, fast_kdf()).is_err());
    }

    #[test]
    fn generated_secrets_look_like_256_bit_tokens() {
        let a = generate_secret().unwrap();
        let b = generate_secret().unwrap();

        // 32 bytes base64url without padding
        assert_eq!(a.len(), 43);
        assert_ne!(*a, *b);
    }
}
