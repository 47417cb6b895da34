//! Represents an image file stored in a gallery folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for a single stored image file.
///
/// The actual bytes live in the object store under `bucket_name/file_name`;
/// this row only records where they are and what they look like.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Unique identifier for this file (UUID for internal DB use).
    pub id: Uuid,

    /// Server-generated storage key (random token + original extension).
    /// Never the user-supplied name, which prevents collisions and path
    /// traversal through hostile filenames.
    pub file_name: String,

    /// The filename the user uploaded the file under.
    pub original_name: String,

    /// Size in bytes.
    pub size: i64,

    /// Content type (MIME type), validated against the upload allow-list.
    pub mime_type: String,

    /// Bucket holding the payload, copied from the parent folder at creation.
    pub bucket_name: String,

    /// Owning folder reference.
    pub folder_id: Uuid,

    /// When this file was uploaded.
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a new file row after the payload is durably
/// stored in the object store.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub file_name: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
    pub bucket_name: String,
    pub folder_id: Uuid,
}
