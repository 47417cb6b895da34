//! HTTP handlers: gallery REST endpoints, the record RPC surface, presigned
//! object downloads, and health probes.

pub mod gallery_handlers;
pub mod health_handlers;
pub mod object_handlers;
pub mod record_handlers;

use crate::services::gallery::GalleryService;
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

/// Shared state carried by the router to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gallery: GalleryService,
    /// Pool handle kept for the readiness probe.
    pub db: Arc<SqlitePool>,
    /// Directory multipart uploads are staged into before validation.
    pub staging_dir: PathBuf,
}
