//! REST endpoints for the image gallery, mounted under `/image-gallery`.
//!
//! Multipart uploads are staged to local disk first (with a coarse 10 MB
//! transport cap applied while streaming), then handed to the service layer
//! which validates against the domain rules and moves the bytes into the
//! object store.

use crate::{
    errors::{FieldError, GalleryError, GalleryResult},
    handlers::AppState,
    services::{
        gallery::{BatchOutcome, StagedUpload},
        upload_policy::{MAX_FILES_PER_BATCH, MAX_UPLOAD_BYTES},
    },
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::Field,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateFolderReq {
    pub name: String,
}

/// Build the `{success, message, data}` envelope every endpoint returns.
fn envelope(status: StatusCode, message: &str, data: Option<Value>) -> Response {
    let mut body = json!({
        "success": true,
        "message": message,
    });
    if let Some(data) = data {
        body["data"] = data;
    }
    (status, Json(body)).into_response()
}

fn parse_id(field: &'static str, raw: &str) -> GalleryResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| GalleryError::invalid(field, format!("{field} must be a UUID")))
}

/// POST `/image-gallery/folders`: create bucket, then folder row.
pub async fn create_folder(
    State(state): State<AppState>,
    Json(payload): Json<CreateFolderReq>,
) -> Result<Response, GalleryError> {
    let folder = state.gallery.create_folder(&payload.name).await?;
    Ok(envelope(
        StatusCode::CREATED,
        "Image gallery folder created successfully",
        Some(json!({ "folder": folder })),
    ))
}

/// DELETE `/image-gallery/folders/{id}`: folder row, then bucket purge.
pub async fn delete_folder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("folderId", &id)?;
    state.gallery.delete_folder(id).await?;
    Ok(envelope(
        StatusCode::OK,
        "Image gallery folder deleted successfully",
        None,
    ))
}

/// POST `/image-gallery/files`: multipart single `file` + `folderId`.
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, GalleryError> {
    let (folder_id, mut staged) = read_multipart(&state, multipart, 1).await?;
    let Some(upload) = staged.pop() else {
        return Err(GalleryError::invalid("file", "File is required"));
    };

    let file = state.gallery.upload_file(folder_id, upload).await?;
    Ok(envelope(
        StatusCode::CREATED,
        "Image file created successfully",
        Some(json!({ "file": file })),
    ))
}

/// POST `/image-gallery/files/multiple`: multipart `files[]` + `folderId`.
///
/// Validation is all-or-nothing; uploads are not. When some files fail after
/// validation passed, the response is an aggregate error carrying both the
/// per-file failures and the records that did get stored.
pub async fn upload_multiple(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, GalleryError> {
    let (folder_id, staged) = read_multipart(&state, multipart, MAX_FILES_PER_BATCH).await?;
    if staged.is_empty() {
        return Err(GalleryError::invalid("files", "Files are required"));
    }

    let total = staged.len();
    let outcome = state.gallery.upload_multiple(folder_id, staged).await?;
    Ok(batch_response(total, outcome))
}

fn batch_response(total: usize, outcome: BatchOutcome) -> Response {
    if outcome.failures.is_empty() {
        return envelope(
            StatusCode::CREATED,
            "Image files created successfully",
            Some(json!({ "files": outcome.files })),
        );
    }

    let errors: Vec<FieldError> = outcome
        .failures
        .iter()
        .map(|failure| FieldError::new(failure.original_name.clone(), failure.error.to_string()))
        .collect();
    let body = json!({
        "success": false,
        "message": format!("{} of {} files failed to upload", outcome.failures.len(), total),
        "errors": errors,
        "data": { "files": outcome.files },
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// DELETE `/image-gallery/files/{id}`: file row, then object removal.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("id", &id)?;
    state.gallery.delete_file(id).await?;
    Ok(envelope(
        StatusCode::OK,
        "Image file deleted successfully",
        None,
    ))
}

/// GET `/image-gallery/files/{id}/url`: presigned URL for one file.
pub async fn get_file_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("id", &id)?;
    let url = state.gallery.get_file_url(id).await?;
    Ok(envelope(
        StatusCode::OK,
        "Image file URL generated successfully",
        Some(json!({ "url": url })),
    ))
}

/// Drain a multipart body: pick up the `folderId` text field and stage up to
/// `max_files` file fields to disk.
async fn read_multipart(
    state: &AppState,
    mut multipart: Multipart,
    max_files: usize,
) -> GalleryResult<(Uuid, Vec<StagedUpload>)> {
    let mut folder_id: Option<String> = None;
    let mut staged: Vec<StagedUpload> = Vec::new();

    let result: GalleryResult<()> = async {
        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|err| GalleryError::invalid("body", format!("Malformed multipart body: {err}")))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("folderId") => {
                    let value = field.text().await.map_err(|err| {
                        GalleryError::invalid("folderId", format!("Unreadable folderId field: {err}"))
                    })?;
                    folder_id = Some(value);
                }
                Some("file") | Some("files") => {
                    if staged.len() >= max_files {
                        return Err(GalleryError::invalid(
                            "files",
                            format!("At most {max_files} file(s) per request"),
                        ));
                    }
                    staged.push(stage_field(state, &mut field).await?);
                }
                other => {
                    debug!(field = ?other, "ignoring unexpected multipart field");
                }
            }
        }
        Ok(())
    }
    .await;

    if let Err(err) = result {
        // Abandon anything staged so far; the request is rejected whole.
        for upload in &staged {
            let _ = tokio::fs::remove_file(&upload.path).await;
        }
        return Err(err);
    }

    let folder_id = folder_id
        .ok_or_else(|| GalleryError::invalid("folderId", "Folder id is required"))
        .and_then(|raw| parse_id("folderId", &raw));
    match folder_id {
        Ok(id) => Ok((id, staged)),
        Err(err) => {
            for upload in &staged {
                let _ = tokio::fs::remove_file(&upload.path).await;
            }
            Err(err)
        }
    }
}

/// Stream one multipart file field to a staging file, enforcing the coarse
/// transport size cap on the way.
async fn stage_field(state: &AppState, field: &mut Field<'_>) -> GalleryResult<StagedUpload> {
    let original_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| GalleryError::invalid("file", "Original filename is required"))?;
    let mime_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".into());

    let path = state.staging_dir.join(format!("upload-{}", Uuid::new_v4()));
    let mut dest = File::create(&path)
        .await
        .map_err(|err| GalleryError::invalid("file", format!("Could not stage upload: {err}")))?;

    let mut size: i64 = 0;
    loop {
        let chunk: Bytes = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(GalleryError::invalid(
                    "file",
                    format!("Upload stream interrupted: {err}"),
                ));
            }
        };
        size += chunk.len() as i64;
        if size > MAX_UPLOAD_BYTES {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(GalleryError::invalid(
                "file",
                "File exceeds the 10MB upload limit",
            ));
        }
        if let Err(err) = dest.write_all(&chunk).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(GalleryError::invalid(
                "file",
                format!("Could not stage upload: {err}"),
            ));
        }
    }
    if let Err(err) = dest.flush().await {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(GalleryError::invalid(
            "file",
            format!("Could not stage upload: {err}"),
        ));
    }

    Ok(StagedUpload {
        path,
        original_name,
        mime_type,
        size,
    })
}
