//! Access code generation.
//!
//! Codes are the public lookup tokens handed back by `encrypt` and double as
//! the access credential for a record, so every choice here comes from the
//! OS random generator.

use anyhow::{Result, anyhow};
use getrandom::fill;

/// Characters a code may contain: digits, letters and a fixed punctuation set.
pub const ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Shortest code ever produced.
pub const MIN_LEN: usize = 20;
/// Longest code ever produced.
pub const MAX_LEN: usize = 30;

/// Generate a fresh access code of 20-30 printable characters.
///
/// Length and characters are drawn uniformly, giving at least
/// 20 * log2(88) = 129 bits of entropy in the worst case. Uniqueness against
/// a store is the caller's job; two independent calls collide only with
/// negligible probability.
pub fn generate() -> Result<String> {
    let span = (MAX_LEN - MIN_LEN + 1) as u8;
    let len = MIN_LEN + random_below(span)? as usize;

    let mut code = String::with_capacity(len);
    for _ in 0..len {
        let idx = random_below(ALPHABET.len() as u8)?;
        code.push(ALPHABET[idx as usize] as char);
    }
    Ok(code)
}

/// Uniform random value in `0..n` via rejection sampling, so no index of the
/// alphabet is favored by a modulo remainder.
fn random_below(n: u8) -> Result<u8> {
    debug_assert!(n > 0);
    // largest multiple of n that fits in a byte
    let limit = 256u16 - (256u16 % n as u16);
    loop {
        let mut buf = [0u8; 1];
        fill(&mut buf).map_err(|_| anyhow!("OS random generator unavailable"))?;
        if (buf[0] as u16) < limit {
            return Ok(buf[0] % n);
        }
    }
}
