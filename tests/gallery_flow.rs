//! End-to-end gallery flows over an in-memory database and a temporary
//! on-disk object store.

use gallery_store::{
    errors::GalleryError,
    services::{
        gallery::{GalleryService, StagedUpload},
        metadata_store::MetadataStore,
        object_store::ObjectStore,
    },
};
use sqlx::sqlite::SqlitePoolOptions;
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;
use uuid::Uuid;

struct TestHarness {
    service: GalleryService,
    staging: TempDir,
    // Held for the lifetime of the test so the store's directory survives.
    _storage: TempDir,
}

async fn harness() -> TestHarness {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for statement in include_str!("../migrations/0001_init.sql").split(';') {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement).execute(&db).await.unwrap();
        }
    }

    let storage = TempDir::new().unwrap();
    let staging = TempDir::new().unwrap();
    let store = ObjectStore::new(
        storage.path(),
        "http://gallery.test",
        b"test-signing-secret".to_vec(),
    );
    let service = GalleryService::new(MetadataStore::new(Arc::new(db)), store, 3600);
    TestHarness {
        service,
        staging,
        _storage: storage,
    }
}

impl TestHarness {
    /// Write a fake PNG of `size` bytes into staging and describe it the
    /// way the upload handlers would.
    fn stage_png(&self, original_name: &str, size: usize) -> StagedUpload {
        let path = self.staging.path().join(format!("upload-{}", Uuid::new_v4()));
        std::fs::write(&path, vec![0x89u8; size]).unwrap();
        StagedUpload {
            path,
            original_name: original_name.to_string(),
            mime_type: "image/png".to_string(),
            size: size as i64,
        }
    }

    fn stage_with_mime(&self, original_name: &str, mime: &str, size: usize) -> StagedUpload {
        let mut staged = self.stage_png(original_name, size);
        staged.mime_type = mime.to_string();
        staged
    }
}

#[tokio::test]
async fn folder_creation_derives_a_legal_bucket_name() {
    let h = harness().await;

    let folder = h.service.create_folder("My Summer Trip!!").await.unwrap();
    assert!(folder.bucket_name.starts_with("my-summer-trip"));
    assert!(folder.bucket_name.len() >= 3 && folder.bucket_name.len() <= 63);
    assert!(h.service.store().bucket_exists(&folder.bucket_name).await.unwrap());

    let fetched = h.service.metadata().get_folder(folder.id).await.unwrap();
    assert_eq!(fetched.name, "My Summer Trip!!");
    assert_eq!(fetched.bucket_name, folder.bucket_name);
}

#[tokio::test]
async fn folder_names_are_validated() {
    let h = harness().await;

    let err = h.service.create_folder("").await.unwrap_err();
    assert!(matches!(err, GalleryError::Validation { .. }));

    let err = h.service.create_folder("bad/name").await.unwrap_err();
    assert!(matches!(err, GalleryError::Validation { .. }));
}

#[tokio::test]
async fn upload_stores_payload_under_a_generated_key() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();

    let staged = h.stage_png("beach.png", 2 * 1024 * 1024);
    let staged_path = staged.path.clone();
    let record = h.service.upload_file(folder.id, staged).await.unwrap();

    assert_eq!(record.original_name, "beach.png");
    assert_ne!(record.file_name, "beach.png");
    assert!(record.file_name.ends_with(".png"));
    assert_eq!(record.size, 2 * 1024 * 1024);
    assert_eq!(record.folder_id, folder.id);

    // Staging temp file is consumed by the upload.
    assert!(!staged_path.exists());

    let keys = h.service.store().list_keys(&folder.bucket_name).await.unwrap();
    assert_eq!(keys, vec![record.file_name.clone()]);
}

#[tokio::test]
async fn oversized_and_non_image_uploads_are_refused() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();

    let staged = h.stage_png("huge.png", 1024);
    let mut staged = staged;
    staged.size = 6 * 1024 * 1024;
    let err = h.service.upload_file(folder.id, staged).await.unwrap_err();
    assert!(matches!(err, GalleryError::Validation { .. }));

    let staged = h.stage_with_mime("notes.pdf", "application/pdf", 1024);
    let err = h.service.upload_file(folder.id, staged).await.unwrap_err();
    assert!(matches!(err, GalleryError::Validation { .. }));
}

#[tokio::test]
async fn presigned_url_points_at_the_stored_object() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();
    let record = h
        .service
        .upload_file(folder.id, h.stage_png("a.png", 1024))
        .await
        .unwrap();

    let url = h.service.get_file_url(record.id).await.unwrap();
    assert!(url.starts_with("http://gallery.test/objects/"));
    assert!(url.contains(&folder.bucket_name));
    assert!(url.contains(&record.file_name));
    assert!(url.contains("signature="));
    assert!(url.contains("expires="));
}

#[tokio::test]
async fn deleting_a_file_removes_row_and_payload() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();
    let record = h
        .service
        .upload_file(folder.id, h.stage_png("a.png", 1024))
        .await
        .unwrap();

    h.service.delete_file(record.id).await.unwrap();

    let err = h.service.delete_file(record.id).await.unwrap_err();
    assert!(matches!(err, GalleryError::FileNotFound(_)));
    let err = h.service.get_file_url(record.id).await.unwrap_err();
    assert!(matches!(err, GalleryError::FileNotFound(_)));
    assert!(h.service.store().list_keys(&folder.bucket_name).await.unwrap().is_empty());
}

#[tokio::test]
async fn folder_deletion_is_refused_while_files_remain() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();
    let record = h
        .service
        .upload_file(folder.id, h.stage_png("a.png", 1024))
        .await
        .unwrap();

    let err = h.service.delete_folder(folder.id).await.unwrap_err();
    assert!(matches!(err, GalleryError::Validation { .. }));

    h.service.delete_file(record.id).await.unwrap();
    h.service.delete_folder(folder.id).await.unwrap();

    let err = h.service.metadata().get_folder(folder.id).await.unwrap_err();
    assert!(matches!(err, GalleryError::FolderNotFound(_)));
    assert!(!h.service.store().bucket_exists(&folder.bucket_name).await.unwrap());
}

#[tokio::test]
async fn batch_upload_validates_every_file_before_storing_any() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();

    let staged = vec![
        h.stage_png("one.png", 1024),
        h.stage_with_mime("clip.mp4", "video/mp4", 1024),
        h.stage_png("three.png", 1024),
    ];
    let paths: Vec<PathBuf> = staged.iter().map(|s| s.path.clone()).collect();

    let err = h.service.upload_multiple(folder.id, staged).await.unwrap_err();
    let GalleryError::Validation { errors, .. } = err else {
        panic!("expected validation failure");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "clip.mp4");

    // Nothing was stored and staging was cleaned up.
    assert!(h.service.store().list_keys(&folder.bucket_name).await.unwrap().is_empty());
    assert!(paths.iter().all(|p| !p.exists()));
    assert_eq!(
        h.service.metadata().count_files_in_folder(folder.id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn batch_upload_keeps_siblings_of_a_failed_file() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();

    // The second file passes validation but its staged payload is gone by
    // upload time, so only that one fails.
    let mut broken = h.stage_png("two.png", 1024);
    std::fs::remove_file(&broken.path).unwrap();
    broken.path = h.staging.path().join("vanished");

    let staged = vec![h.stage_png("one.png", 1024), broken, h.stage_png("three.png", 1024)];
    let outcome = h.service.upload_multiple(folder.id, staged).await.unwrap();

    assert_eq!(outcome.files.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].original_name, "two.png");
    let names: Vec<&str> = outcome.files.iter().map(|f| f.original_name.as_str()).collect();
    assert_eq!(names, vec!["one.png", "three.png"]);

    let keys = h.service.store().list_keys(&folder.bucket_name).await.unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(
        h.service.metadata().count_files_in_folder(folder.id).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let h = harness().await;
    let folder = h.service.create_folder("Trip").await.unwrap();

    let err = h.service.upload_multiple(folder.id, Vec::new()).await.unwrap_err();
    assert!(matches!(err, GalleryError::Validation { .. }));
}

#[tokio::test]
async fn listing_reports_per_folder_file_counts() {
    let h = harness().await;
    let trip = h.service.create_folder("Trip").await.unwrap();
    let empty = h.service.create_folder("Empty").await.unwrap();
    h.service
        .upload_file(trip.id, h.stage_png("a.png", 1024))
        .await
        .unwrap();
    h.service
        .upload_file(trip.id, h.stage_png("b.png", 1024))
        .await
        .unwrap();

    let folders = h.service.metadata().list_folders().await.unwrap();
    assert_eq!(folders.len(), 2);
    let by_id = |id| folders.iter().find(|f| f.id == id).unwrap();
    assert_eq!(by_id(trip.id).file_count, 2);
    assert_eq!(by_id(empty.id).file_count, 0);
}

#[tokio::test]
async fn upload_into_missing_folder_is_a_not_found() {
    let h = harness().await;
    let err = h
        .service
        .upload_file(Uuid::new_v4(), h.stage_png("a.png", 1024))
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::FolderNotFound(_)));
}
