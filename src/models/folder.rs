//! Represents a gallery folder: a logical grouping of image files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A gallery folder backed by exactly one bucket in the object store.
///
/// The bucket name is derived from the human label at creation time and is
/// immutable afterwards; every file in the folder is stored under it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Unique identifier for this folder (UUID for internal DB use).
    pub id: Uuid,

    /// Human-readable label (1–50 chars, letters/digits/space/hyphen/underscore).
    pub name: String,

    /// Globally unique, storage-legal bucket name derived from `name`.
    pub bucket_name: String,

    /// When this folder was created.
    pub created_at: DateTime<Utc>,

    /// When this folder was last modified.
    pub updated_at: DateTime<Utc>,
}

/// A folder row together with the number of files it holds.
///
/// Returned by the listing endpoint so the dashboard can render counts
/// without a second round-trip.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub id: Uuid,
    pub name: String,
    pub bucket_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Count of file rows referencing this folder.
    pub file_count: i64,
}
