use serde::{Deserialize, Serialize};

/// An authenticated actor. Created on local signup or on first federated
/// login; the credential hash is present only for local signups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}
