use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Share capability on a file. `token` is present iff the file is currently
/// shareable; whether `expires_at` has passed is checked at access time, not
/// swept proactively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareState {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Metadata for one uploaded file. Ownership is fixed at creation; the blob
/// payload lives behind `blob_locator` in the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub blob_locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<ShareState>,
}

impl FileRecord {
    pub fn new(owner_id: &str, name: &str, blob_locator: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            blob_locator: blob_locator.to_string(),
            share: None,
        }
    }
}
