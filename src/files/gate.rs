//! Owner-scoped access to file records.
//!
//! Every read, update, and delete carries the compound predicate
//! `(file_id, owner_id)`. A file owned by someone else answers exactly like a
//! file that does not exist (`NotFound`, never a forbidden response), so no
//! request can probe for the existence of another principal's files. Upload
//! sets ownership implicitly and needs no check.

use tracing::info;

use crate::blobstore::BlobStore;
use crate::error::AppResult;
use crate::identity::Principal;
use crate::store::SharedMeta;

use super::record::FileRecord;

pub struct FileGate {
    store: SharedMeta,
}

impl FileGate {
    pub fn new(store: SharedMeta) -> Self {
        Self { store }
    }

    pub async fn list(&self, owner: &Principal) -> Vec<FileRecord> {
        self.store.list_files(&owner.id).await
    }

    pub async fn fetch(&self, owner: &Principal, file_id: &str) -> AppResult<FileRecord> {
        self.store
            .get_file_owned(file_id, &owner.id)
            .await
            .ok_or_else(crate::error::AppError::file_not_found)
    }

    /// Store the payload first, then commit the metadata. If the blob write
    /// fails no record is created, so no metadata ever points at a payload
    /// that was never stored.
    pub async fn create(
        &self,
        owner: &Principal,
        name: &str,
        bytes: &[u8],
        blobs: &dyn BlobStore,
    ) -> AppResult<FileRecord> {
        let locator = blobs.store(name, bytes).await?;
        let record = self.store.insert_file(FileRecord::new(&owner.id, name, &locator)).await?;
        info!(target: "drivebox::files", "upload owner={} file={} bytes={}", owner.id, record.id, bytes.len());
        Ok(record)
    }

    /// Release the blob, then the metadata, as one logical delete. A failed
    /// blob delete aborts the whole operation so no billable payload is left
    /// orphaned behind deleted metadata.
    pub async fn delete(&self, owner: &Principal, file_id: &str, blobs: &dyn BlobStore) -> AppResult<()> {
        let record = self.fetch(owner, file_id).await?;
        blobs.delete(&record.blob_locator).await?;
        self.store.delete_file_owned(file_id, &owner.id).await?;
        info!(target: "drivebox::files", "delete owner={} file={}", owner.id, file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::FsBlobStore;
    use crate::error::AppError;
    use crate::store::MetaStore;

    async fn fixture() -> (tempfile::TempDir, FileGate, FsBlobStore, Principal, Principal) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MetaStore::open(dir.path().join("meta")).expect("open store");
        let blobs = FsBlobStore::new(dir.path().join("blobs"), "http://localhost:8080", 1024).expect("blobstore");
        let a = store.create_local_principal("alice", "x").await.unwrap();
        let b = store.create_local_principal("bob", "x").await.unwrap();
        (dir, FileGate::new(store), blobs, a, b)
    }

    #[tokio::test]
    async fn foreign_owner_sees_not_found_everywhere() {
        let (_dir, gate, blobs, alice, bob) = fixture().await;
        let file = gate.create(&alice, "notes.txt", b"hello", &blobs).await.unwrap();

        let fetch = gate.fetch(&bob, &file.id).await.unwrap_err();
        assert!(matches!(fetch, AppError::NotFound { .. }));
        let delete = gate.delete(&bob, &file.id, &blobs).await.unwrap_err();
        assert!(matches!(delete, AppError::NotFound { .. }));

        // and the shape matches a genuinely missing id
        let missing = gate.fetch(&alice, "no-such-file").await.unwrap_err();
        assert_eq!(fetch.code_str(), missing.code_str());
        assert_eq!(fetch.message(), missing.message());

        // untouched for the owner
        assert_eq!(gate.list(&alice).await.len(), 1);
    }

    #[tokio::test]
    async fn delete_releases_blob_and_metadata() {
        let (_dir, gate, blobs, alice, _bob) = fixture().await;
        let file = gate.create(&alice, "notes.txt", b"hello", &blobs).await.unwrap();
        assert!(blobs.fetch(&file.blob_locator).await.is_ok());

        gate.delete(&alice, &file.id, &blobs).await.unwrap();
        assert!(gate.list(&alice).await.is_empty());
        assert!(blobs.fetch(&file.blob_locator).await.is_err());
    }

    #[tokio::test]
    async fn rejected_upload_leaves_no_metadata() {
        let (_dir, gate, blobs, alice, _bob) = fixture().await;
        let big = vec![0u8; 4096]; // over the 1 KiB fixture cap
        let err = gate.create(&alice, "big.bin", &big, &blobs).await.unwrap_err();
        assert!(matches!(err, AppError::UploadRejected { .. }));
        assert!(gate.list(&alice).await.is_empty());
    }
}
