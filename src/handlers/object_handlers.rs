//! Presigned object downloads: the storage-host half of the presign scheme.
//!
//! `GET /objects/{bucket}/{*key}` verifies the HMAC signature and expiry
//! carried in the query string, then streams the payload. Bytes are never
//! buffered in memory; storage concerns stay behind `ObjectStore`.

use crate::{errors::GalleryError, handlers::AppState, services::object_store::StoreError};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct PresignQuery {
    pub expires: i64,
    pub signature: String,
}

fn refuse(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}

/// GET `/objects/{bucket}/{*key}`: verify, then stream.
pub async fn download_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<PresignQuery>,
) -> Result<Response, GalleryError> {
    let store = state.gallery.store();

    let valid = match store.verify_presigned(&bucket, &key, query.expires, &query.signature) {
        Ok(valid) => valid,
        Err(err) => {
            debug!(bucket, key, error = %err, "presign verification errored");
            false
        }
    };
    if !valid {
        return Ok(refuse(
            StatusCode::FORBIDDEN,
            "Signature invalid or expired",
        ));
    }

    let file = match store.open_object(&bucket, &key).await {
        Ok(file) => file,
        Err(StoreError::ObjectNotFound { .. }) => {
            return Ok(refuse(StatusCode::NOT_FOUND, "Object not found"));
        }
        Err(StoreError::InvalidBucketName { .. } | StoreError::InvalidObjectKey) => {
            return Ok(refuse(StatusCode::BAD_REQUEST, "Invalid object address"));
        }
        Err(err) => {
            tracing::error!(bucket, key, error = %err, "failed to open object payload");
            return Ok(refuse(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not read object",
            ));
        }
    };

    // Best-effort Content-Type from the metadata row; a missing row still
    // serves the bytes as an opaque stream.
    let content_type = state
        .gallery
        .metadata()
        .find_file_by_location(&bucket, &key)
        .await
        .ok()
        .flatten()
        .map(|record| record.mime_type)
        .unwrap_or_else(|| "application/octet-stream".into());

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    Ok(response)
}
