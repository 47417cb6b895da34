//! Defines routes for the gallery REST surface, the record RPC surface,
//! presigned object downloads, and health probes.
//!
//! ## Structure
//! - **Gallery endpoints** (`/image-gallery/...`): the orchestrated
//!   operations: folder create/delete, file upload (single and batch),
//!   file delete, presigned-URL retrieval.
//! - **Record endpoints** (`/rpc/image-gallery/...`): the metadata store
//!   exposed directly for the dashboard; reads plus row-only mutations.
//! - **Object endpoint** (`/objects/{bucket}/{*key}`): signature-checked
//!   payload downloads. The wildcard `*key` tolerates path-like keys.
//! - **Health endpoints**: `/healthz`, `/readyz`.

use crate::handlers::{
    AppState,
    gallery_handlers::{
        create_folder, delete_file, delete_folder, get_file_url, upload_file, upload_multiple,
    },
    health_handlers::{healthz, readyz},
    object_handlers::download_object,
    record_handlers::{
        create_file_record, create_folder_record, delete_file_record, delete_folder_record,
        get_file_record, get_folder_record, list_file_records, list_folder_records,
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Room for a full batch of transport-capped files plus multipart overhead.
const MAX_BODY_BYTES: usize = 110 * 1024 * 1024;

/// Build and return the router for all gallery routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // gallery REST surface
        .route("/image-gallery/folders", post(create_folder))
        .route("/image-gallery/folders/{id}", delete(delete_folder))
        .route("/image-gallery/files", post(upload_file))
        .route("/image-gallery/files/multiple", post(upload_multiple))
        .route("/image-gallery/files/{id}", delete(delete_file))
        .route("/image-gallery/files/{id}/url", get(get_file_url))
        // record RPC surface
        .route(
            "/rpc/image-gallery/folders",
            get(list_folder_records).post(create_folder_record),
        )
        .route(
            "/rpc/image-gallery/folders/{id}",
            get(get_folder_record).delete(delete_folder_record),
        )
        .route(
            "/rpc/image-gallery/folders/{id}/files",
            get(list_file_records),
        )
        .route("/rpc/image-gallery/files", post(create_file_record))
        .route(
            "/rpc/image-gallery/files/{id}",
            get(get_file_record).delete(delete_file_record),
        )
        // presigned downloads
        .route("/objects/{bucket}/{*key}", get(download_object))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
