//! Error taxonomy for gallery operations.
//!
//! A single closed enum covers every failure kind the service can surface;
//! the HTTP layer maps each kind to a status code and a structured
//! `{success, message, errors?}` body. Underlying causes are preserved via
//! `#[source]` so they land in the logs without leaking into responses.

use crate::services::object_store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// A single field-level validation failure, reported alongside the
/// human-readable message so callers can highlight the offending input.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("image gallery folder `{0}` not found")]
    FolderNotFound(String),

    #[error("image file `{0}` not found")]
    FileNotFound(String),

    #[error("failed to {operation} bucket `{bucket}`")]
    BucketOperation {
        operation: &'static str,
        bucket: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to upload file `{file_name}`")]
    FileUpload {
        file_name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to delete file `{file_name}`")]
    FileDeletion {
        file_name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to generate URL for file `{file_id}`")]
    UrlGeneration {
        file_id: String,
        #[source]
        source: StoreError,
    },

    #[error("database {operation} operation failed")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl GalleryError {
    /// Shorthand for a validation failure with a single offending field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        GalleryError::Validation {
            message: "Validation error".into(),
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GalleryError::Validation { .. } => StatusCode::BAD_REQUEST,
            GalleryError::FolderNotFound(_) | GalleryError::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            GalleryError::BucketOperation { .. }
            | GalleryError::FileUpload { .. }
            | GalleryError::FileDeletion { .. }
            | GalleryError::UrlGeneration { .. }
            | GalleryError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type GalleryResult<T> = Result<T, GalleryError>;

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "gallery operation failed");
        }

        let body = match &self {
            GalleryError::Validation { message, errors } => json!({
                "success": false,
                "message": message,
                "errors": errors,
            }),
            other => json!({
                "success": false,
                "message": other.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
