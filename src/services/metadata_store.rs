//! Relational persistence for folder and file metadata.
//!
//! Plain SQL over a shared SQLite pool. Every query maps `RowNotFound` to
//! the matching not-found kind at the call site and wraps anything else as a
//! database failure, so callers never see raw `sqlx::Error`.

use crate::{
    errors::{GalleryError, GalleryResult},
    models::{
        file::{FileRecord, NewFile},
        folder::{Folder, FolderSummary},
    },
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct MetadataStore {
    db: Arc<SqlitePool>,
}

impl MetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a folder row for an already-created bucket.
    pub async fn create_folder(&self, name: &str, bucket_name: &str) -> GalleryResult<Folder> {
        let now = Utc::now();
        let folder = Folder {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bucket_name: bucket_name.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO folders (id, name, bucket_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(folder.id)
        .bind(&folder.name)
        .bind(&folder.bucket_name)
        .bind(folder.created_at)
        .bind(folder.updated_at)
        .execute(&*self.db)
        .await
        .map_err(|source| GalleryError::Database {
            operation: "create folder",
            source,
        })?;

        Ok(folder)
    }

    /// Delete a folder row, returning the deleted row so the caller can
    /// purge the bucket without a second lookup.
    pub async fn delete_folder(&self, id: Uuid) -> GalleryResult<Folder> {
        sqlx::query_as::<_, Folder>(
            "DELETE FROM folders WHERE id = ?
             RETURNING id, name, bucket_name, created_at, updated_at",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => GalleryError::FolderNotFound(id.to_string()),
            source => GalleryError::Database {
                operation: "delete folder",
                source,
            },
        })
    }

    /// List all folders with their file counts, newest first.
    pub async fn list_folders(&self) -> GalleryResult<Vec<FolderSummary>> {
        sqlx::query_as::<_, FolderSummary>(
            "SELECT f.id, f.name, f.bucket_name, f.created_at, f.updated_at,
                    COUNT(fi.id) AS file_count
             FROM folders f
             LEFT JOIN files fi ON fi.folder_id = f.id
             GROUP BY f.id
             ORDER BY f.created_at DESC",
        )
        .fetch_all(&*self.db)
        .await
        .map_err(|source| GalleryError::Database {
            operation: "list folders",
            source,
        })
    }

    pub async fn get_folder(&self, id: Uuid) -> GalleryResult<Folder> {
        sqlx::query_as::<_, Folder>(
            "SELECT id, name, bucket_name, created_at, updated_at
             FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => GalleryError::FolderNotFound(id.to_string()),
            source => GalleryError::Database {
                operation: "get folder",
                source,
            },
        })
    }

    /// Insert a file row after the payload is durably stored.
    ///
    /// Verifies the owning folder first so a dangling `folder_id` surfaces
    /// as a not-found rather than a constraint violation.
    pub async fn create_file(&self, fields: NewFile) -> GalleryResult<FileRecord> {
        self.get_folder(fields.folder_id).await?;

        let record = FileRecord {
            id: Uuid::new_v4(),
            file_name: fields.file_name,
            original_name: fields.original_name,
            size: fields.size,
            mime_type: fields.mime_type,
            bucket_name: fields.bucket_name,
            folder_id: fields.folder_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO files (id, file_name, original_name, size, mime_type,
                                bucket_name, folder_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.file_name)
        .bind(&record.original_name)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(&record.bucket_name)
        .bind(record.folder_id)
        .bind(record.created_at)
        .execute(&*self.db)
        .await
        .map_err(|source| GalleryError::Database {
            operation: "create file",
            source,
        })?;

        Ok(record)
    }

    /// Delete a file row, returning it so the caller can remove the payload
    /// without a second lookup. A second delete of the same id yields
    /// `FileNotFound`, the correct idempotent outcome for a delete race.
    pub async fn delete_file(&self, id: Uuid) -> GalleryResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(
            "DELETE FROM files WHERE id = ?
             RETURNING id, file_name, original_name, size, mime_type,
                       bucket_name, folder_id, created_at",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => GalleryError::FileNotFound(id.to_string()),
            source => GalleryError::Database {
                operation: "delete file",
                source,
            },
        })
    }

    pub async fn get_file(&self, id: Uuid) -> GalleryResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT id, file_name, original_name, size, mime_type,
                    bucket_name, folder_id, created_at
             FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => GalleryError::FileNotFound(id.to_string()),
            source => GalleryError::Database {
                operation: "get file",
                source,
            },
        })
    }

    /// List a folder's files, erroring if the folder itself is absent.
    pub async fn list_files_by_folder(&self, folder_id: Uuid) -> GalleryResult<Vec<FileRecord>> {
        self.get_folder(folder_id).await?;

        sqlx::query_as::<_, FileRecord>(
            "SELECT id, file_name, original_name, size, mime_type,
                    bucket_name, folder_id, created_at
             FROM files WHERE folder_id = ?
             ORDER BY created_at ASC",
        )
        .bind(folder_id)
        .fetch_all(&*self.db)
        .await
        .map_err(|source| GalleryError::Database {
            operation: "list files",
            source,
        })
    }

    /// Number of file rows referencing a folder.
    pub async fn count_files_in_folder(&self, folder_id: Uuid) -> GalleryResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files WHERE folder_id = ?")
            .bind(folder_id)
            .fetch_one(&*self.db)
            .await
            .map_err(|source| GalleryError::Database {
                operation: "count files",
                source,
            })
    }

    /// Look a file up by its storage location. Best-effort helper for the
    /// download route's Content-Type header; absence is not an error there.
    pub async fn find_file_by_location(
        &self,
        bucket_name: &str,
        file_name: &str,
    ) -> GalleryResult<Option<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT id, file_name, original_name, size, mime_type,
                    bucket_name, folder_id, created_at
             FROM files WHERE bucket_name = ? AND file_name = ?",
        )
        .bind(bucket_name)
        .bind(file_name)
        .fetch_optional(&*self.db)
        .await
        .map_err(|source| GalleryError::Database {
            operation: "find file",
            source,
        })
    }
}
