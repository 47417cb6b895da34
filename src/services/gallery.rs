//! Orchestration of folder and file workflows across the metadata store and
//! the object store.
//!
//! The two systems share no transaction, so step order is chosen to leave
//! the cheaper side effect dangling on failure: buckets are created before
//! rows, and rows are deleted before payloads. Where a paired write fails
//! after its partner succeeded, a best-effort compensation runs (delete the
//! fresh bucket or object) and its own failure is only logged.

use crate::{
    errors::{FieldError, GalleryError, GalleryResult},
    models::{file::{FileRecord, NewFile}, folder::Folder},
    services::{
        bucket_name,
        metadata_store::MetadataStore,
        object_store::ObjectStore,
        upload_policy,
    },
};
use futures::{StreamExt, stream};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Concurrency window for batch uploads.
const UPLOAD_CONCURRENCY: usize = 5;

/// A file staged on local disk by the transport layer, waiting to be
/// validated and moved into the object store.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub path: PathBuf,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
}

/// One file's failure inside a batch upload.
#[derive(Debug)]
pub struct BatchFailure {
    pub original_name: String,
    pub error: GalleryError,
}

/// Result of a batch upload. Validation is all-or-nothing, but uploads are
/// not: siblings that succeeded stay stored even when others fail, and the
/// caller must inspect `failures` to notice the partial outcome.
#[derive(Debug)]
pub struct BatchOutcome {
    pub files: Vec<FileRecord>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Clone)]
pub struct GalleryService {
    metadata: MetadataStore,
    store: ObjectStore,
    presign_ttl_secs: u64,
}

impl GalleryService {
    pub fn new(metadata: MetadataStore, store: ObjectStore, presign_ttl_secs: u64) -> Self {
        Self {
            metadata,
            store,
            presign_ttl_secs,
        }
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Create a folder: derive a bucket name, create the bucket, then the
    /// row. A row-insert failure triggers a best-effort delete of the bucket
    /// that was just created for it.
    pub async fn create_folder(&self, name: &str) -> GalleryResult<Folder> {
        upload_policy::validate_folder_name(name)?;

        let bucket = bucket_name::generate(name);
        self.store
            .ensure_bucket(&bucket)
            .await
            .map_err(|source| GalleryError::BucketOperation {
                operation: "create",
                bucket: bucket.clone(),
                source,
            })?;

        match self.metadata.create_folder(name, &bucket).await {
            Ok(folder) => {
                info!(folder_id = %folder.id, bucket, "image gallery folder created");
                Ok(folder)
            }
            Err(err) => {
                if let Err(cleanup) = self.store.delete_bucket(&bucket).await {
                    warn!(bucket, error = %cleanup, "failed to remove bucket after folder insert failed");
                }
                Err(err)
            }
        }
    }

    /// Delete a folder: refuse while files remain, then remove the row
    /// (capturing the bucket name) and purge the bucket. A purge failure
    /// leaves an orphan bucket with the row already gone; it is surfaced,
    /// not retried.
    pub async fn delete_folder(&self, id: Uuid) -> GalleryResult<()> {
        let file_count = self.metadata.count_files_in_folder(id).await?;
        if file_count > 0 {
            return Err(GalleryError::invalid(
                "folderId",
                format!("Folder still contains {file_count} file(s); delete them first"),
            ));
        }

        let folder = self.metadata.delete_folder(id).await?;
        self.store
            .delete_bucket(&folder.bucket_name)
            .await
            .map_err(|source| GalleryError::BucketOperation {
                operation: "delete",
                bucket: folder.bucket_name.clone(),
                source,
            })?;

        info!(folder_id = %id, bucket = folder.bucket_name, "image gallery folder deleted");
        Ok(())
    }

    /// Upload a single staged file into a folder's bucket.
    pub async fn upload_file(
        &self,
        folder_id: Uuid,
        staged: StagedUpload,
    ) -> GalleryResult<FileRecord> {
        upload_policy::validate_image_upload(&staged.original_name, &staged.mime_type, staged.size)?;
        let folder = self.metadata.get_folder(folder_id).await?;
        self.upload_to_bucket(&folder.bucket_name, folder_id, staged)
            .await
    }

    /// Upload a batch: validate every file before uploading any, then run
    /// the uploads through a bounded concurrency window. One file's failure
    /// does not roll back its siblings.
    pub async fn upload_multiple(
        &self,
        folder_id: Uuid,
        staged: Vec<StagedUpload>,
    ) -> GalleryResult<BatchOutcome> {
        if staged.is_empty() {
            return Err(GalleryError::invalid("files", "Files are required"));
        }

        let mut field_errors = Vec::new();
        for upload in &staged {
            if let Err(GalleryError::Validation { errors, .. }) = upload_policy::validate_image_upload(
                &upload.original_name,
                &upload.mime_type,
                upload.size,
            ) {
                for err in errors {
                    field_errors.push(FieldError::new(
                        upload.original_name.clone(),
                        err.message,
                    ));
                }
            }
        }
        if !field_errors.is_empty() {
            // Fail fast: nothing has touched the object store yet. The
            // staged temp files are no longer needed.
            for upload in &staged {
                cleanup_staging(&upload.path).await;
            }
            return Err(GalleryError::Validation {
                message: "Validation error".into(),
                errors: field_errors,
            });
        }

        let folder = self.metadata.get_folder(folder_id).await?;
        let bucket = folder.bucket_name.as_str();

        let mut results: Vec<(usize, String, GalleryResult<FileRecord>)> =
            stream::iter(staged.into_iter().enumerate())
                .map(|(index, upload)| {
                    let original = upload.original_name.clone();
                    async move {
                        let result = self.upload_to_bucket(bucket, folder_id, upload).await;
                        (index, original, result)
                    }
                })
                .buffer_unordered(UPLOAD_CONCURRENCY)
                .collect()
                .await;
        results.sort_by_key(|(index, _, _)| *index);

        let mut outcome = BatchOutcome {
            files: Vec::new(),
            failures: Vec::new(),
        };
        for (_, original_name, result) in results {
            match result {
                Ok(record) => outcome.files.push(record),
                Err(error) => outcome.failures.push(BatchFailure {
                    original_name,
                    error,
                }),
            }
        }
        Ok(outcome)
    }

    /// Delete a file: row first (capturing bucket and key), then payload.
    /// A payload-removal failure leaves an orphan object; it is surfaced.
    pub async fn delete_file(&self, id: Uuid) -> GalleryResult<()> {
        let record = self.metadata.delete_file(id).await?;
        self.store
            .delete_object(&record.bucket_name, &record.file_name)
            .await
            .map_err(|source| GalleryError::FileDeletion {
                file_name: record.file_name.clone(),
                source,
            })?;

        info!(file_id = %id, bucket = record.bucket_name, key = record.file_name, "image file deleted");
        Ok(())
    }

    /// Look a file up and presign a GET URL for it. No caching here; that
    /// is the client companion's job.
    pub async fn get_file_url(&self, id: Uuid) -> GalleryResult<String> {
        let record = self.metadata.get_file(id).await?;
        self.store
            .presign_get(&record.bucket_name, &record.file_name, self.presign_ttl_secs)
            .await
            .map_err(|source| GalleryError::UrlGeneration {
                file_id: id.to_string(),
                source,
            })
    }

    /// Store one staged file and insert its row. The staging file is removed
    /// unconditionally once the put attempt finishes, success or not; a
    /// row-insert failure triggers a best-effort delete of the stored object.
    async fn upload_to_bucket(
        &self,
        bucket: &str,
        folder_id: Uuid,
        staged: StagedUpload,
    ) -> GalleryResult<FileRecord> {
        let file_name = format!(
            "{}{}",
            Uuid::new_v4(),
            extension_of(&staged.original_name)
        );

        let put_result = self
            .store
            .put_object(
                bucket,
                &file_name,
                &staged.path,
                &staged.mime_type,
                staged.size,
            )
            .await;
        cleanup_staging(&staged.path).await;

        let stored = put_result.map_err(|source| GalleryError::FileUpload {
            file_name: file_name.clone(),
            source,
        })?;

        let fields = NewFile {
            file_name: file_name.clone(),
            original_name: staged.original_name,
            size: stored.size,
            mime_type: staged.mime_type,
            bucket_name: bucket.to_string(),
            folder_id,
        };
        match self.metadata.create_file(fields).await {
            Ok(record) => {
                info!(file_id = %record.id, bucket, key = file_name, "image file uploaded");
                Ok(record)
            }
            Err(err) => {
                if let Err(cleanup) = self.store.delete_object(bucket, &file_name).await {
                    warn!(bucket, key = file_name, error = %cleanup, "failed to remove object after file insert failed");
                }
                Err(err)
            }
        }
    }
}

/// Extension of the user-supplied name, dot included, or empty.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Remove a staging file, logging and continuing on failure.
async fn cleanup_staging(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "staging file removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove staging file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_preserved_with_its_dot() {
        assert_eq!(extension_of("photo.PNG"), ".PNG");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("no-extension"), "");
    }
}
