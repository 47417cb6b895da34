//! Disk-backed object store with an HMAC presigned-URL scheme.
//!
//! Buckets are directories under `base_path`; object payloads live beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}` with two MD5-derived shard
//! levels to keep per-directory file counts down. Writes go through a
//! temporary file, are fsynced, and renamed into place so a crash never
//! leaves a half-written payload at its final path.
//!
//! Presigned GET URLs carry an expiry timestamp and an HMAC-SHA256 signature
//! over `bucket\nkey\nexpires`; the download route verifies both before
//! streaming bytes. Presigning is pure computation and deliberately does not
//! check that the key exists: a URL for a missing object simply 404s when
//! fetched.

use crate::services::bucket_name::is_ipv4_like;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use md5::Context;
use sha2::Sha256;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of a presigned GET URL: 24 hours.
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 86_400;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("signing key rejected by HMAC")]
    InvalidSigningKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a durable object write.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// MD5 of the stored payload, hex-encoded.
    pub etag: String,
    /// Bytes actually written.
    pub size: i64,
}

/// The storage-side half of the gallery: bucket lifecycle, object payloads,
/// and presigned URL generation/verification.
#[derive(Clone)]
pub struct ObjectStore {
    /// Base directory on disk where bucket directories live.
    pub base_path: PathBuf,
    /// Externally reachable base URL presigned links are built against.
    public_url: String,
    /// Secret for the presign HMAC.
    signing_key: Vec<u8>,
}

impl ObjectStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        public_url: impl Into<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            signing_key: signing_key.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Keys are normally server-generated UUID tokens, but the presigned
    /// download route accepts them straight from the URL path.
    fn ensure_key_safe(&self, key: &str) -> StoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StoreError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StoreError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces the S3-like rules the name generator guarantees, because
    /// bucket names also arrive untrusted through the download route:
    /// 3–63 chars, lowercase letters/digits/dots/hyphens, alphanumeric at
    /// both ends, no `..`/`.-`/`-.` sequences, not an IPv4 literal.
    fn ensure_bucket_name_safe(&self, name: &str) -> StoreResult<()> {
        let invalid = |reason: &str| StoreError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        };

        let len = name.len();
        if len < BUCKET_NAME_MIN_LEN || len > BUCKET_NAME_MAX_LEN {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }
        let first = name.chars().next().unwrap_or('-');
        let last = name.chars().last().unwrap_or('-');
        if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }
        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(invalid(
                "cannot contain consecutive dots or dot-hyphen combinations",
            ));
        }
        if is_ipv4_like(name) {
            return Err(invalid("must not be formatted like an IP address"));
        }
        Ok(())
    }

    /// Physical directory for a bucket. Does not check existence.
    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Two-level shard identifiers for an object key: the first two bytes of
    /// MD5(bucket/key) as lowercase hex.
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path: `base/{bucket}/{shard}/{shard}/{key}`.
    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.bucket_root(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Whether a bucket exists on disk.
    pub async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        self.ensure_bucket_name_safe(bucket)?;
        Ok(fs::try_exists(self.bucket_root(bucket)).await?)
    }

    /// Create a bucket directory. Fails with `BucketAlreadyExists` when the
    /// directory is already present; callers wanting idempotence go through
    /// [`ObjectStore::ensure_bucket`].
    pub async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.ensure_bucket_name_safe(bucket)?;
        let root = self.bucket_root(bucket);
        if fs::try_exists(&root).await? {
            return Err(StoreError::BucketAlreadyExists(bucket.to_string()));
        }
        fs::create_dir_all(&root).await?;
        tracing::info!(bucket, "bucket created");
        Ok(())
    }

    /// Check-and-create: the only bucket-creation entry point the rest of
    /// the system uses. Returns whether a creation actually occurred.
    pub async fn ensure_bucket(&self, bucket: &str) -> StoreResult<bool> {
        if self.bucket_exists(bucket).await? {
            return Ok(false);
        }
        match self.create_bucket(bucket).await {
            Ok(()) => Ok(true),
            // Lost a race with a concurrent creator; the bucket is there.
            Err(StoreError::BucketAlreadyExists(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Enumerate every object key currently stored in a bucket.
    pub async fn list_keys(&self, bucket: &str) -> StoreResult<Vec<String>> {
        self.ensure_bucket_name_safe(bucket)?;
        let root = self.bucket_root(bucket);
        if !fs::try_exists(&root).await? {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }

        let mut keys = Vec::new();
        let mut stack = vec![root];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                } else if let Some(name) = entry.file_name().to_str() {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Delete a bucket and everything in it.
    ///
    /// Objects are enumerated and removed one by one before the directory
    /// tree goes; a failure mid-enumeration leaves the bucket non-empty and
    /// the deletion incomplete, which the caller surfaces rather than hides.
    pub async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        let keys = self.list_keys(bucket).await?;
        for key in keys {
            debug!(bucket, key, "deleting object during bucket purge");
            self.delete_object(bucket, &key).await?;
        }

        let root = self.bucket_root(bucket);
        match fs::remove_dir_all(&root).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::Io(err)),
        }
        tracing::info!(bucket, "bucket deleted");
        Ok(())
    }

    /// Store an object durably from a staged source file.
    ///
    /// Streams the payload through a temp file, computing MD5 and size on
    /// the way, fsyncs, then renames into the final sharded path. The
    /// declared size is advisory; the byte count actually read wins and a
    /// mismatch is logged.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source_path: &Path,
        content_type: &str,
        declared_size: i64,
    ) -> StoreResult<StoredObject> {
        self.ensure_key_safe(key)?;
        self.ensure_bucket_name_safe(bucket)?;
        if !fs::try_exists(self.bucket_root(bucket)).await? {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }

        let file_path = self.object_path(bucket, key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StoreError::Io(io::Error::other("object path missing parent")))?;
        fs::create_dir_all(&parent).await?;

        let mut source = File::open(source_path).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut dest = File::create(&tmp_path).await?;

        let mut size: i64 = 0;
        let mut digest = Context::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let read = match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size += read as i64;
            digest.consume(&buf[..read]);
            if let Err(err) = dest.write_all(&buf[..read]).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = dest.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = dest.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if size != declared_size {
            tracing::warn!(
                bucket,
                key,
                declared_size,
                actual = size,
                "staged file size differs from declared size"
            );
        }
        debug!(bucket, key, size, content_type, "object stored");

        Ok(StoredObject {
            etag: format!("{:x}", digest.compute()),
            size,
        })
    }

    /// Remove an object's payload. A payload that is already gone is logged
    /// and treated as success, which makes filesystem-level deletion
    /// idempotent; the metadata row is the authoritative existence check.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.ensure_key_safe(key)?;
        self.ensure_bucket_name_safe(bucket)?;

        let file_path = self.object_path(bucket, key);
        match fs::remove_file(&file_path).await {
            Ok(()) => debug!(bucket, key, "removed object payload"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(bucket, key, "object payload already missing");
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }
        Ok(())
    }

    /// Open an object payload for streaming out.
    pub async fn open_object(&self, bucket: &str, key: &str) -> StoreResult<File> {
        self.ensure_key_safe(key)?;
        self.ensure_bucket_name_safe(bucket)?;
        File::open(self.object_path(bucket, key))
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StoreError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StoreError::Io(err)
                }
            })
    }

    /// Build a time-limited, signature-bearing GET URL for an object.
    ///
    /// Pure computation: no I/O and no existence check. Async only for
    /// uniformity with the rest of the store's surface.
    pub async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl_secs: u64,
    ) -> StoreResult<String> {
        self.ensure_key_safe(key)?;
        self.ensure_bucket_name_safe(bucket)?;

        let expires = Utc::now().timestamp() + ttl_secs as i64;
        let signature = self.sign(bucket, key, expires)?;
        Ok(format!(
            "{}/objects/{}/{}?expires={}&signature={}",
            self.public_url, bucket, key, expires, signature
        ))
    }

    /// Verify a presigned URL's signature and expiry.
    pub fn verify_presigned(
        &self,
        bucket: &str,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> StoreResult<bool> {
        if expires < Utc::now().timestamp() {
            return Ok(false);
        }
        let mut mac = self.mac()?;
        mac.update(Self::signing_payload(bucket, key, expires).as_bytes());
        let Ok(raw) = URL_SAFE_NO_PAD.decode(signature) else {
            return Ok(false);
        };
        Ok(mac.verify_slice(&raw).is_ok())
    }

    fn sign(&self, bucket: &str, key: &str, expires: i64) -> StoreResult<String> {
        let mut mac = self.mac()?;
        mac.update(Self::signing_payload(bucket, key, expires).as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    fn signing_payload(bucket: &str, key: &str, expires: i64) -> String {
        format!("{}\n{}\n{}", bucket, key, expires)
    }

    fn mac(&self) -> StoreResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.signing_key).map_err(|_| StoreError::InvalidSigningKey)
    }

    /// Recursively remove empty shard directories up to the bucket root.
    /// Stops at the first non-empty or missing directory.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(()) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ObjectStore {
        ObjectStore::new(dir.path(), "http://localhost:3000", "test-secret".as_bytes())
    }

    async fn stage(dir: &TempDir, body: &[u8]) -> PathBuf {
        let path = dir.path().join(format!("staged-{}", Uuid::new_v4()));
        fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn ensure_bucket_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.ensure_bucket("my-photos-abc12345").await.unwrap());
        assert!(!store.ensure_bucket("my-photos-abc12345").await.unwrap());
        assert!(store.bucket_exists("my-photos-abc12345").await.unwrap());
    }

    #[tokio::test]
    async fn put_then_delete_roundtrip() {
        let dir = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let store = store(&dir);
        store.ensure_bucket("trip-bucket").await.unwrap();

        let source = stage(&staging, b"payload-bytes").await;
        let stored = store
            .put_object("trip-bucket", "abc.png", &source, "image/png", 13)
            .await
            .unwrap();
        assert_eq!(stored.size, 13);
        assert_eq!(stored.etag.len(), 32);
        assert_eq!(store.list_keys("trip-bucket").await.unwrap(), vec!["abc.png"]);

        store.delete_object("trip-bucket", "abc.png").await.unwrap();
        assert!(store.list_keys("trip-bucket").await.unwrap().is_empty());
        // Deleting again is a no-op at the filesystem level.
        store.delete_object("trip-bucket", "abc.png").await.unwrap();
    }

    #[tokio::test]
    async fn delete_bucket_purges_objects_first() {
        let dir = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let store = store(&dir);
        store.ensure_bucket("doomed-bucket").await.unwrap();
        for key in ["a.png", "b.png", "c.png"] {
            let source = stage(&staging, b"x").await;
            store
                .put_object("doomed-bucket", key, &source, "image/png", 1)
                .await
                .unwrap();
        }

        store.delete_bucket("doomed-bucket").await.unwrap();
        assert!(!store.bucket_exists("doomed-bucket").await.unwrap());

        let err = store.delete_bucket("doomed-bucket").await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
    }

    #[tokio::test]
    async fn put_into_missing_bucket_fails() {
        let dir = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let store = store(&dir);
        let source = stage(&staging, b"x").await;
        let err = store
            .put_object("no-such-bucket", "k.png", &source, "image/png", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
    }

    #[tokio::test]
    async fn presign_produces_verifiable_signed_url() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        // No existence check: presigning a key that was never stored works.
        let url = store
            .presign_get("any-bucket", "ghost.png", 3600)
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:3000/objects/any-bucket/ghost.png?"));
        assert!(url.contains("signature="));

        let query = url.split('?').nth(1).unwrap();
        let mut expires = 0i64;
        let mut signature = String::new();
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            match k {
                "expires" => expires = v.parse().unwrap(),
                "signature" => signature = v.to_string(),
                _ => {}
            }
        }

        assert!(store
            .verify_presigned("any-bucket", "ghost.png", expires, &signature)
            .unwrap());
        // A different key invalidates the signature.
        assert!(!store
            .verify_presigned("any-bucket", "other.png", expires, &signature)
            .unwrap());
        // An expired timestamp is rejected even with a valid signature shape.
        assert!(!store
            .verify_presigned("any-bucket", "ghost.png", 1_000, &signature)
            .unwrap());
    }

    #[tokio::test]
    async fn hostile_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.bucket_exists("Bad Name").await.unwrap_err(),
            StoreError::InvalidBucketName { .. }
        ));
        assert!(matches!(
            store.delete_object("ok-bucket", "../etc/passwd").await.unwrap_err(),
            StoreError::InvalidObjectKey
        ));
    }
}
