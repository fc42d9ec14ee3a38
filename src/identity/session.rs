//! Durable sessions with an absolute expiry.
//!
//! `issue` hands out an opaque session id backed by a store entry; the expiry
//! is fixed at issuance and never renewed on activity. `resolve` treats
//! expired and unknown ids identically (anonymous), and `logout` invalidates
//! the entry immediately regardless of expiry. Expired entries are reclaimed
//! by the periodic sweep the server spawns, not on the request path.

use chrono::{Duration, Utc};

use crate::error::AppResult;
use crate::security;
use crate::store::{SessionRecord, SharedMeta};
use crate::tprintln;

use super::principal::Principal;

pub struct SessionManager {
    store: SharedMeta,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: SharedMeta, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn issue(&self, principal: &Principal) -> AppResult<String> {
        let session_id = security::gen_token();
        let expires_at = Utc::now() + self.ttl;
        self.store
            .put_session(&session_id, SessionRecord { principal_id: principal.id.clone(), expires_at })
            .await?;
        tprintln!("session.issue user={} ttl_secs={}", principal.name, self.ttl.num_seconds());
        Ok(session_id)
    }

    /// Expired and unknown session ids both come back as `None`; callers send
    /// the client to login either way.
    pub async fn resolve(&self, session_id: &str) -> Option<Principal> {
        let record = self.store.get_session(session_id).await?;
        if record.expires_at <= Utc::now() {
            return None;
        }
        self.store.get_principal(&record.principal_id).await
    }

    pub async fn logout(&self, session_id: &str) -> AppResult<bool> {
        let removed = self.store.remove_session(session_id).await?;
        tprintln!("session.logout removed={}", removed);
        Ok(removed)
    }

    pub async fn sweep(&self) -> AppResult<usize> {
        self.store.sweep_sessions(Utc::now()).await
    }
}
