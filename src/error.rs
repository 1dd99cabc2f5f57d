use std::fmt;

#[derive(Debug)]
pub enum VaultError {
    DuplicateCode(String),
    DecryptFailed,
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::DuplicateCode(c) => write!(f, "code '{c}' already exists"),
            VaultError::DecryptFailed => write!(f, "wrong key or corrupted ciphertext"),
        }
    }
}

impl std::error::Error for VaultError {}
