//!
//! drivebox metadata store
//! -----------------------
//! Disk-rooted store for principals, federated credentials, file records and
//! sessions. State lives in memory behind a `tokio::sync::RwLock` and is
//! write-through persisted as a JSON snapshot (`meta.json`) under the
//! configured root folder.
//!
//! Uniqueness constraints are enforced here, inside the write lock, and
//! surface as `Conflict`: principal names (local signups), `(issuer, subject)`
//! federated pairs, and share tokens. The first-federated-login create is a
//! single write under that lock, so callers retrying on `Conflict` can rely
//! on a re-read observing the winning row.
//!
//! The store is constructed explicitly and passed into each component; there
//! is no ambient global handle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::files::FileRecord;
use crate::identity::Principal;

/// Binds one (issuer, subject) pair to exactly one principal, fixed at
/// creation. Never updated; not deleted by normal flows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FederatedCredential {
    pub issuer: String,
    pub subject: String,
    pub principal_id: String,
}

/// Server-held session entry. Expiry is absolute, fixed at issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub principal_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    principals: HashMap<String, Principal>,
    /// Keyed by `fed_key(issuer, subject)`.
    #[serde(default)]
    federated: HashMap<String, FederatedCredential>,
    #[serde(default)]
    files: HashMap<String, FileRecord>,
    #[serde(default)]
    sessions: HashMap<String, SessionRecord>,
}

// Unit separator keeps the composite key unambiguous for any issuer/subject.
fn fed_key(issuer: &str, subject: &str) -> String {
    format!("{}\u{1f}{}", issuer, subject)
}

pub type SharedMeta = Arc<MetaStore>;

pub struct MetaStore {
    path: PathBuf,
    inner: RwLock<Snapshot>,
}

impl MetaStore {
    /// Open (or initialize) the store rooted at the given folder. The folder
    /// is created if missing; an existing `meta.json` is loaded.
    pub fn open<P: AsRef<Path>>(root: P) -> anyhow::Result<SharedMeta> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let path = root.join("meta.json");
        let snapshot = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            Snapshot::default()
        };
        debug!(target: "drivebox::store", "open: root='{}' principals={} files={}",
            root.display(), snapshot.principals.len(), snapshot.files.len());
        Ok(Arc::new(Self { path, inner: RwLock::new(snapshot) }))
    }

    async fn persist(&self, snap: &Snapshot) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(snap)
            .map_err(|e| AppError::internal("store_encode", &e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| AppError::internal("store_write", &e.to_string()))
    }

    // ----- principals -----

    /// Insert a locally-credentialed principal. `Conflict` when the name is
    /// already taken.
    pub async fn create_local_principal(&self, name: &str, password_hash: &str) -> AppResult<Principal> {
        let mut snap = self.inner.write().await;
        if snap.principals.values().any(|p| p.name == name) {
            return Err(AppError::conflict("user_exists", "user already exists"));
        }
        let principal = Principal {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            password_hash: Some(password_hash.to_string()),
        };
        snap.principals.insert(principal.id.clone(), principal.clone());
        self.persist(&snap).await?;
        Ok(principal)
    }

    pub async fn find_principal_by_name(&self, name: &str) -> Option<Principal> {
        let snap = self.inner.read().await;
        snap.principals.values().find(|p| p.name == name).cloned()
    }

    pub async fn get_principal(&self, id: &str) -> Option<Principal> {
        let snap = self.inner.read().await;
        snap.principals.get(id).cloned()
    }

    // ----- federated credentials -----

    pub async fn find_federated(&self, issuer: &str, subject: &str) -> Option<Principal> {
        let snap = self.inner.read().await;
        let cred = snap.federated.get(&fed_key(issuer, subject))?;
        snap.principals.get(&cred.principal_id).cloned()
    }

    /// Create a principal and its federated credential as one write under the
    /// store lock. `Conflict` when the (issuer, subject) pair already exists;
    /// the caller is expected to retry by re-reading.
    pub async fn create_federated_principal(
        &self,
        issuer: &str,
        subject: &str,
        display_name: &str,
    ) -> AppResult<Principal> {
        let mut snap = self.inner.write().await;
        let key = fed_key(issuer, subject);
        if snap.federated.contains_key(&key) {
            return Err(AppError::conflict("federated_exists", "federated credential already linked"));
        }
        let principal = Principal {
            id: uuid::Uuid::new_v4().to_string(),
            name: display_name.to_string(),
            password_hash: None,
        };
        snap.principals.insert(principal.id.clone(), principal.clone());
        snap.federated.insert(key, FederatedCredential {
            issuer: issuer.to_string(),
            subject: subject.to_string(),
            principal_id: principal.id.clone(),
        });
        self.persist(&snap).await?;
        Ok(principal)
    }

    // ----- file records -----

    pub async fn insert_file(&self, record: FileRecord) -> AppResult<FileRecord> {
        let mut snap = self.inner.write().await;
        snap.files.insert(record.id.clone(), record.clone());
        self.persist(&snap).await?;
        Ok(record)
    }

    pub async fn list_files(&self, owner_id: &str) -> Vec<FileRecord> {
        let snap = self.inner.read().await;
        let mut out: Vec<FileRecord> = snap.files.values().filter(|f| f.owner_id == owner_id).cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Compound-predicate lookup: the record must exist AND belong to the
    /// given owner. Foreign-owned records read the same as missing ones.
    pub async fn get_file_owned(&self, file_id: &str, owner_id: &str) -> Option<FileRecord> {
        let snap = self.inner.read().await;
        snap.files.get(file_id).filter(|f| f.owner_id == owner_id).cloned()
    }

    /// Read-modify-write a file record under the same compound predicate.
    /// The closure runs inside the write lock, so share-state transitions are
    /// atomic with respect to concurrent requests.
    pub async fn modify_file_owned<R>(
        &self,
        file_id: &str,
        owner_id: &str,
        f: impl FnOnce(&mut FileRecord) -> AppResult<R>,
    ) -> AppResult<R> {
        let mut snap = self.inner.write().await;
        let record = snap
            .files
            .get_mut(file_id)
            .filter(|r| r.owner_id == owner_id)
            .ok_or_else(AppError::file_not_found)?;
        let out = f(record)?;
        self.persist(&snap).await?;
        Ok(out)
    }

    pub async fn delete_file_owned(&self, file_id: &str, owner_id: &str) -> AppResult<FileRecord> {
        let mut snap = self.inner.write().await;
        let owned = snap.files.get(file_id).map(|f| f.owner_id == owner_id).unwrap_or(false);
        if !owned {
            return Err(AppError::file_not_found());
        }
        let removed = snap.files.remove(file_id).ok_or_else(AppError::file_not_found)?;
        self.persist(&snap).await?;
        Ok(removed)
    }

    pub async fn find_file_by_token(&self, token: &str) -> Option<FileRecord> {
        let snap = self.inner.read().await;
        snap.files
            .values()
            .find(|f| f.share.as_ref().map(|s| s.token == token).unwrap_or(false))
            .cloned()
    }

    // ----- sessions -----

    pub async fn put_session(&self, session_id: &str, record: SessionRecord) -> AppResult<()> {
        let mut snap = self.inner.write().await;
        snap.sessions.insert(session_id.to_string(), record);
        self.persist(&snap).await
    }

    pub async fn get_session(&self, session_id: &str) -> Option<SessionRecord> {
        let snap = self.inner.read().await;
        snap.sessions.get(session_id).cloned()
    }

    pub async fn remove_session(&self, session_id: &str) -> AppResult<bool> {
        let mut snap = self.inner.write().await;
        let removed = snap.sessions.remove(session_id).is_some();
        if removed {
            self.persist(&snap).await?;
        }
        Ok(removed)
    }

    /// Drop every session whose absolute expiry has passed. Runs from the
    /// background sweeper, decoupled from request handling.
    pub async fn sweep_sessions(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut snap = self.inner.write().await;
        let before = snap.sessions.len();
        snap.sessions.retain(|_, s| s.expires_at > now);
        let removed = before - snap.sessions.len();
        if removed > 0 {
            self.persist(&snap).await?;
            debug!(target: "drivebox::store", "sweep_sessions: removed={}", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::ShareState;
    use chrono::Duration;

    fn temp_store() -> (tempfile::TempDir, SharedMeta) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MetaStore::open(dir.path()).expect("open store");
        (dir, store)
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let (_dir, store) = temp_store();
        store.create_local_principal("alice", "phc").await.unwrap();
        let err = store.create_local_principal("alice", "phc2").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn federated_create_is_atomic_and_unique() {
        let (_dir, store) = temp_store();
        let p1 = store.create_federated_principal("https://accounts.example", "sub-1", "Alice").await.unwrap();
        let err = store.create_federated_principal("https://accounts.example", "sub-1", "Alice2").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        let found = store.find_federated("https://accounts.example", "sub-1").await.unwrap();
        assert_eq!(found.id, p1.id);
        // the losing create must not have left a second principal behind
        assert!(store.find_principal_by_name("Alice2").await.is_none());
    }

    #[tokio::test]
    async fn owned_lookup_hides_foreign_files() {
        let (_dir, store) = temp_store();
        let a = store.create_local_principal("a", "x").await.unwrap();
        let b = store.create_local_principal("b", "x").await.unwrap();
        let file = store.insert_file(FileRecord::new(&a.id, "notes.txt", "loc-1")).await.unwrap();

        assert!(store.get_file_owned(&file.id, &a.id).await.is_some());
        assert!(store.get_file_owned(&file.id, &b.id).await.is_none());
        let err = store.delete_file_owned(&file.id, &b.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        // still present for the real owner
        assert_eq!(store.list_files(&a.id).await.len(), 1);
    }

    #[tokio::test]
    async fn modify_file_owned_enforces_predicate() {
        let (_dir, store) = temp_store();
        let a = store.create_local_principal("a", "x").await.unwrap();
        let file = store.insert_file(FileRecord::new(&a.id, "notes.txt", "loc-1")).await.unwrap();

        let err = store
            .modify_file_owned(&file.id, "someone-else", |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        store
            .modify_file_owned(&file.id, &a.id, |f| {
                f.share = Some(ShareState { token: "t".into(), expires_at: Utc::now() + Duration::hours(1) });
                Ok(())
            })
            .await
            .unwrap();
        assert!(store.find_file_by_token("t").await.is_some());
    }

    #[tokio::test]
    async fn sessions_sweep_only_expired() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        store.put_session("live", SessionRecord { principal_id: "p".into(), expires_at: now + Duration::hours(1) }).await.unwrap();
        store.put_session("dead", SessionRecord { principal_id: "p".into(), expires_at: now - Duration::seconds(1) }).await.unwrap();

        let removed = store.sweep_sessions(now).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_session("live").await.is_some());
        assert!(store.get_session("dead").await.is_none());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a_id = {
            let store = MetaStore::open(dir.path()).expect("open");
            let a = store.create_local_principal("alice", "phc").await.unwrap();
            store.insert_file(FileRecord::new(&a.id, "notes.txt", "loc-1")).await.unwrap();
            a.id
        };
        let reopened = MetaStore::open(dir.path()).expect("reopen");
        let alice = reopened.find_principal_by_name("alice").await.unwrap();
        assert_eq!(alice.id, a_id);
        assert_eq!(reopened.list_files(&a_id).await.len(), 1);
    }
}
