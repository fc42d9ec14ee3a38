//! Local credential verification and signup.
//!
//! `verify` never tells the caller whether the name existed: an unknown name
//! runs a decoy Argon2 verification so both failure paths cost the same, and
//! both map to the single `bad_credentials` outcome. Hashing is CPU-bound and
//! runs under `spawn_blocking` so a burst of login attempts cannot stall
//! unrelated request tasks.

use crate::error::{AppError, AppResult};
use crate::security;
use crate::store::SharedMeta;
use crate::tprintln;

use super::principal::Principal;

const NAME_MAX: usize = 15;
const PASSWORD_MIN: usize = 3;
const PASSWORD_MAX: usize = 15;

pub struct CredentialVerifier {
    store: SharedMeta,
}

impl CredentialVerifier {
    pub fn new(store: SharedMeta) -> Self {
        Self { store }
    }

    pub async fn verify(&self, name: &str, password: &str) -> AppResult<Principal> {
        let found = self.store.find_principal_by_name(name).await;
        let hash = found.as_ref().and_then(|p| p.password_hash.clone());
        let password = password.to_string();
        let matched = tokio::task::spawn_blocking(move || match hash.as_deref() {
            Some(h) => security::verify_password(h, &password),
            // Federated-only principals have no local hash and fail the same way.
            None => security::verify_decoy(&password),
        })
        .await
        .map_err(|e| AppError::internal("hash_task", &e.to_string()))?;

        match found {
            Some(principal) if matched => {
                tprintln!("auth.verify ok name={}", principal.name);
                Ok(principal)
            }
            _ => Err(AppError::bad_credentials()),
        }
    }

    /// Create a locally-credentialed principal. Field rules follow the signup
    /// form: alphanumeric name up to 15 chars, password 3..=15 chars with a
    /// matching confirmation.
    pub async fn signup(&self, name: &str, password: &str, confirm: &str) -> AppResult<Principal> {
        let name = name.trim();
        if name.is_empty() || name.len() > NAME_MAX {
            return Err(AppError::validation("name_length", "name is required, max 15 characters"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::validation("name_charset", "name must be alphanumeric"));
        }
        if password.len() < PASSWORD_MIN || password.len() > PASSWORD_MAX {
            return Err(AppError::validation("password_length", "password must be between 3 and 15 characters"));
        }
        if password != confirm {
            return Err(AppError::validation("password_mismatch", "passwords must match"));
        }

        let password = password.to_string();
        let phc = tokio::task::spawn_blocking(move || security::hash_password(&password))
            .await
            .map_err(|e| AppError::internal("hash_task", &e.to_string()))?
            .map_err(|e| AppError::internal("hash_failed", &e.to_string()))?;

        self.store.create_local_principal(name, &phc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MetaStore;

    fn verifier() -> (tempfile::TempDir, CredentialVerifier) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MetaStore::open(dir.path()).expect("open store");
        (dir, CredentialVerifier::new(store))
    }

    #[tokio::test]
    async fn signup_then_verify() {
        let (_dir, v) = verifier();
        let p = v.signup("alice", "s3cret", "s3cret").await.unwrap();
        assert_eq!(p.name, "alice");
        assert!(p.password_hash.is_some());
        let again = v.verify("alice", "s3cret").await.unwrap();
        assert_eq!(again.id, p.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_name_fail_alike() {
        let (_dir, v) = verifier();
        v.signup("alice", "s3cret", "s3cret").await.unwrap();

        let wrong = v.verify("alice", "nope").await.unwrap_err();
        let unknown = v.verify("nobody", "nope").await.unwrap_err();
        assert_eq!(wrong.code_str(), unknown.code_str());
        assert_eq!(wrong.message(), unknown.message());
        assert!(matches!(wrong, AppError::Auth { .. }));
        assert!(matches!(unknown, AppError::Auth { .. }));
    }

    #[tokio::test]
    async fn signup_validation_rules() {
        let (_dir, v) = verifier();
        assert!(matches!(v.signup("", "abc", "abc").await.unwrap_err(), AppError::Validation { .. }));
        assert!(matches!(v.signup("has space", "abc", "abc").await.unwrap_err(), AppError::Validation { .. }));
        assert!(matches!(v.signup("toolongname12345x", "abc", "abc").await.unwrap_err(), AppError::Validation { .. }));
        assert!(matches!(v.signup("bob", "ab", "ab").await.unwrap_err(), AppError::Validation { .. }));
        assert!(matches!(v.signup("bob", "abc", "abd").await.unwrap_err(), AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn duplicate_signup_is_conflict() {
        let (_dir, v) = verifier();
        v.signup("alice", "s3cret", "s3cret").await.unwrap();
        let err = v.signup("alice", "other1", "other1").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }
}
