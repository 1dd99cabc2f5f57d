use super::{KEY_LEN, NONCE_LEN, SALT_LEN};
use crate::error::VaultError;
use anyhow::{Result, anyhow};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use getrandom::fill;
use zeroize::Zeroizing;

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| anyhow!("OS random generator unavailable"))
}

/// Generate a fresh per-record salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Encrypt plaintext into a self-contained envelope.
///
/// A fresh random nonce is generated internally and prepended to the
/// ciphertext, so the caller never handles nonces.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| anyhow!("encryption failed"))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypt an envelope produced by [`seal`].
///
/// Fails with [`VaultError::DecryptFailed`] on a truncated envelope, a wrong
/// key, or tampered ciphertext.
pub fn open(key: &[u8; KEY_LEN], envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if envelope.len() < NONCE_LEN {
        return Err(VaultError::DecryptFailed);
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::DecryptFailed)?;
    Ok(Zeroizing::new(plaintext))
}
