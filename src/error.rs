//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the HTTP boundary and
//! the core identity/file components, along with the HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Field-level, user-correctable input problems (bad name, past expiry).
    Validation { code: String, message: String },
    /// Generic incorrect-credential outcome. Never split into sub-causes
    /// visible to the client.
    Auth { code: String, message: String },
    /// Missing, foreign-owned, and expired/unknown-token resources all use
    /// this variant so the caller cannot tell which case applied.
    NotFound { code: String, message: String },
    /// Duplicate local signup name or duplicate federated credential.
    Conflict { code: String, message: String },
    /// Blob store refused the payload (size/type policy).
    UploadRejected { code: String, message: String },
    /// Blob store failed to persist the payload; metadata must not commit.
    UploadFailed { code: String, message: String },
    /// Blob store failed to release the payload; metadata must not commit.
    DeleteFailed { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::Auth { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::UploadRejected { code, .. }
            | AppError::UploadFailed { code, .. }
            | AppError::DeleteFailed { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::UploadRejected { message, .. }
            | AppError::UploadFailed { message, .. }
            | AppError::DeleteFailed { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn upload_rejected<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UploadRejected { code: code.into(), message: msg.into() } }
    pub fn upload_failed<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UploadFailed { code: code.into(), message: msg.into() } }
    pub fn delete_failed<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::DeleteFailed { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// The one credential failure the client ever sees, for unknown names and
    /// wrong passwords alike.
    pub fn bad_credentials() -> Self {
        AppError::auth("bad_credentials", "incorrect name or password")
    }

    /// The one not-found shape for files, whether missing, foreign-owned, or
    /// reached through an unknown/expired share token.
    pub fn file_not_found() -> Self {
        AppError::not_found("file_not_found", "file not found or expired")
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::UploadRejected { .. } => 413,
            AppError::UploadFailed { .. } => 502,
            AppError::DeleteFailed { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}
