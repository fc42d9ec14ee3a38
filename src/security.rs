//! Password hashing and opaque token generation.
//!
//! Passwords are stored as Argon2 PHC strings with a random salt; verification
//! goes through the argon2 crate's constant-time comparison. Tokens and ids
//! come from the OS RNG, never from sequence numbers or timestamps.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use base64::Engine;
use once_cell::sync::Lazy;
use password_hash::{PasswordHash, SaltString};

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

// A throwaway hash verified against when the looked-up user does not exist,
// so the unknown-name path costs the same as the wrong-password path.
static DECOY_HASH: Lazy<String> = Lazy::new(|| hash_password("decoy").unwrap_or_default());

/// Burn the same amount of work as a real verification and always fail.
pub fn verify_decoy(password: &str) -> bool {
    verify_password(&DECOY_HASH, password);
    false
}

/// 256-bit random token, base64url without padding. Used for session ids and
/// share tokens.
pub fn gen_token() -> String {
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let phc = hash_password("hunter2").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password(&phc, "hunter2"));
        assert!(!verify_password(&phc, "hunter3"));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn decoy_always_fails() {
        assert!(!verify_decoy("hunter2"));
        assert!(!verify_decoy("decoy"));
    }

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = gen_token();
        let b = gen_token();
        assert_eq!(a.len(), 43); // 32 bytes base64url, no padding
        assert_ne!(a, b);
        assert!(!a.contains('='));
    }
}
