//! Share-link lifecycle for a file record.
//!
//! States per record: Private (no token), Shared (token + future expiry),
//! Expired (token kept, expiry passed; denied at access time), Revoked
//! (back to Private). Re-sharing while a token exists reuses it so the public
//! URL stays stable across expiry extensions; only an explicit unshare
//! rotates the token, and a dead token is never resurrected.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::Principal;
use crate::security;
use crate::store::SharedMeta;

use super::record::ShareState;

pub struct ShareLinkManager {
    store: SharedMeta,
}

impl ShareLinkManager {
    pub fn new(store: SharedMeta) -> Self {
        Self { store }
    }

    /// Share (or extend the share of) an owned file. The expiry must be
    /// strictly in the future at the moment it is written.
    pub async fn share(
        &self,
        owner: &Principal,
        file_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<ShareState> {
        if expires_at <= Utc::now() {
            return Err(AppError::validation("invalid_expiry", "expiry time must be a future instant"));
        }
        let state = self
            .store
            .modify_file_owned(file_id, &owner.id, |record| {
                let token = match record.share.take() {
                    // Shared or Expired: keep the token, move the expiry.
                    Some(existing) => existing.token,
                    // Private or Revoked: mint a fresh unguessable token.
                    None => security::gen_token(),
                };
                let state = ShareState { token, expires_at };
                record.share = Some(state.clone());
                Ok(state)
            })
            .await?;
        info!(target: "drivebox::share", "share owner={} file={} expires_at={}", owner.id, file_id, state.expires_at);
        Ok(state)
    }

    /// Revoke the share. Idempotent; a later re-share mints a new token.
    pub async fn unshare(&self, owner: &Principal, file_id: &str) -> AppResult<()> {
        self.store
            .modify_file_owned(file_id, &owner.id, |record| {
                record.share = None;
                Ok(())
            })
            .await?;
        info!(target: "drivebox::share", "unshare owner={} file={}", owner.id, file_id);
        Ok(())
    }

    /// Resolve a public share token to the file's blob locator. An unknown
    /// token and an expired one produce the same `NotFound`.
    pub async fn resolve_shared(&self, token: &str) -> AppResult<String> {
        let record = self.store.find_file_by_token(token).await.ok_or_else(AppError::file_not_found)?;
        match &record.share {
            Some(state) if state.expires_at > Utc::now() => Ok(record.blob_locator.clone()),
            _ => Err(AppError::file_not_found()),
        }
    }
}
