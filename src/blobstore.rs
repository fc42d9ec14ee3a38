//! Blob storage collaborator contract and the disk-backed adapter.
//!
//! The core only ever talks to `BlobStore`: an awaitable store that either
//! yields a locator or rejects the payload, a locator-to-URL mapping, and a
//! delete whose failure is always surfaced to the caller. `FsBlobStore` keeps
//! payloads under a root folder with random locators and serves them back
//! through the `/blobs/{locator}` route.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::security;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the payload and return its opaque locator. Policy violations
    /// come back as `UploadRejected` with no partial write observable.
    async fn store(&self, name: &str, bytes: &[u8]) -> AppResult<String>;

    /// Public access URL for a stored payload.
    fn locate(&self, locator: &str) -> String;

    /// Read the payload back. Unknown locators are `NotFound`.
    async fn fetch(&self, locator: &str) -> AppResult<Vec<u8>>;

    /// Release the payload. Failures surface as `DeleteFailed` and must not
    /// be swallowed; an already-released locator is fine.
    async fn delete(&self, locator: &str) -> AppResult<()>;
}

pub struct FsBlobStore {
    root: PathBuf,
    public_base: String,
    max_bytes: usize,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, public_base: &str, max_bytes: usize) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, public_base: public_base.trim_end_matches('/').to_string(), max_bytes })
    }

    fn blob_path(&self, locator: &str) -> Option<PathBuf> {
        // Locators are minted by us as base64url; anything else never names a path.
        if locator.is_empty() || !locator.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return None;
        }
        Some(self.root.join(locator))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, name: &str, bytes: &[u8]) -> AppResult<String> {
        if bytes.len() > self.max_bytes {
            return Err(AppError::upload_rejected("payload_too_large", "file exceeds the upload size limit"));
        }
        let locator = security::gen_token();
        let path = self.root.join(&locator);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::upload_failed("blob_write", &e.to_string()))?;
        debug!(target: "drivebox::blobs", "store name='{}' locator={} bytes={}", name, locator, bytes.len());
        Ok(locator)
    }

    fn locate(&self, locator: &str) -> String {
        format!("{}/blobs/{}", self.public_base, locator)
    }

    async fn fetch(&self, locator: &str) -> AppResult<Vec<u8>> {
        let path = self.blob_path(locator).ok_or_else(AppError::file_not_found)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::file_not_found(),
            _ => AppError::internal("blob_read", &e.to_string()),
        })
    }

    async fn delete(&self, locator: &str) -> AppResult<()> {
        let path = self.blob_path(locator).ok_or_else(|| AppError::delete_failed("blob_delete", "malformed locator"))?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone; repeating a delete is not a failure.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::delete_failed("blob_delete", &e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max: usize) -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let blobs = FsBlobStore::new(dir.path(), "http://localhost:8080/", max).expect("blobstore");
        (dir, blobs)
    }

    #[tokio::test]
    async fn store_fetch_delete_roundtrip() {
        let (_dir, blobs) = store(1024);
        let locator = blobs.store("notes.txt", b"hello").await.unwrap();
        assert_eq!(blobs.fetch(&locator).await.unwrap(), b"hello");
        blobs.delete(&locator).await.unwrap();
        assert!(matches!(blobs.fetch(&locator).await.unwrap_err(), AppError::NotFound { .. }));
        // deleting again is fine
        blobs.delete(&locator).await.unwrap();
    }

    #[tokio::test]
    async fn oversize_payload_is_rejected() {
        let (_dir, blobs) = store(4);
        let err = blobs.store("big.bin", b"hello").await.unwrap_err();
        assert!(matches!(err, AppError::UploadRejected { .. }));
    }

    #[tokio::test]
    async fn locate_builds_public_url_without_double_slash() {
        let (_dir, blobs) = store(1024);
        assert_eq!(blobs.locate("abc"), "http://localhost:8080/blobs/abc");
    }

    #[tokio::test]
    async fn traversal_locators_never_touch_disk() {
        let (_dir, blobs) = store(1024);
        assert!(blobs.fetch("../meta.json").await.is_err());
        assert!(blobs.delete("../../etc/passwd").await.is_err());
    }
}
