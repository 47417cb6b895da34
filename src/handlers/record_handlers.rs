//! The RPC surface: metadata-store operations exposed directly for the
//! dashboard, mounted under `/rpc/image-gallery`.
//!
//! Reads back the admin UI; the mutation mirrors exist for the backend's own
//! use and deliberately never touch the object store: creating a folder
//! record here does not create a bucket, which is why this surface is not
//! meant for untrusted direct access.

use crate::{
    errors::{GalleryError, GalleryResult},
    handlers::AppState,
    models::file::NewFile,
    services::upload_policy,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

fn ok(data: Value) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

fn created(data: Value) -> Response {
    (StatusCode::CREATED, Json(json!({ "success": true, "data": data }))).into_response()
}

fn parse_id(field: &'static str, raw: &str) -> GalleryResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| GalleryError::invalid(field, format!("{field} must be a UUID")))
}

/// GET `/rpc/image-gallery/folders`: all folders with file counts.
pub async fn list_folder_records(
    State(state): State<AppState>,
) -> Result<Response, GalleryError> {
    let folders = state.gallery.metadata().list_folders().await?;
    Ok(ok(json!({ "folders": folders })))
}

/// GET `/rpc/image-gallery/folders/{id}`
pub async fn get_folder_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("id", &id)?;
    let folder = state.gallery.metadata().get_folder(id).await?;
    Ok(ok(json!({ "folder": folder })))
}

/// GET `/rpc/image-gallery/folders/{id}/files`
pub async fn list_file_records(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("id", &id)?;
    let folder = state.gallery.metadata().get_folder(id).await?;
    let files = state.gallery.metadata().list_files_by_folder(id).await?;
    Ok(ok(json!({ "folder": folder, "files": files })))
}

/// GET `/rpc/image-gallery/files/{id}`
pub async fn get_file_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("id", &id)?;
    let file = state.gallery.metadata().get_file(id).await?;
    Ok(ok(json!({ "file": file })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRecordReq {
    pub name: String,
    pub bucket_name: String,
}

/// POST `/rpc/image-gallery/folders`: row only, bucket assumed to exist.
pub async fn create_folder_record(
    State(state): State<AppState>,
    Json(payload): Json<CreateFolderRecordReq>,
) -> Result<Response, GalleryError> {
    upload_policy::validate_folder_name(&payload.name)?;
    let folder = state
        .gallery
        .metadata()
        .create_folder(&payload.name, &payload.bucket_name)
        .await?;
    Ok(created(json!({ "folder": folder })))
}

/// POST `/rpc/image-gallery/files`: row only, object assumed to exist.
pub async fn create_file_record(
    State(state): State<AppState>,
    Json(payload): Json<NewFile>,
) -> Result<Response, GalleryError> {
    let file = state.gallery.metadata().create_file(payload).await?;
    Ok(created(json!({ "file": file })))
}

/// DELETE `/rpc/image-gallery/folders/{id}`: row only; returns the deleted
/// folder so the caller can purge its bucket.
pub async fn delete_folder_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("id", &id)?;
    let folder = state.gallery.metadata().delete_folder(id).await?;
    Ok(ok(json!({ "folder": folder })))
}

/// DELETE `/rpc/image-gallery/files/{id}`: row only; returns the deleted
/// file so the caller can remove its object.
pub async fn delete_file_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, GalleryError> {
    let id = parse_id("id", &id)?;
    let file = state.gallery.metadata().delete_file(id).await?;
    Ok(ok(json!({ "file": file })))
}
