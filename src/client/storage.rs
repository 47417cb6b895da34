//! Persistence backends for the URL cache.
//!
//! The cache keeps its state under two fixed keys, mirroring the shape a
//! browser client would keep in localStorage: one JSON map of file id to
//! URL, one of file id to insertion timestamp. Writes are best-effort;
//! losing the cache only costs re-fetches.

use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing::warn;

/// Storage key for the file-id → URL map.
pub const URL_CACHE_KEY: &str = "gallery-url-cache";
/// Storage key for the file-id → timestamp map.
pub const TIMESTAMP_CACHE_KEY: &str = "gallery-url-cache-timestamps";

/// A tiny key-value store the cache persists itself into.
pub trait CacheStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, value: &str);
}

/// File-backed store: one JSON file per key under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key, error = %err, "failed to load cache state");
                None
            }
        }
    }

    fn save(&mut self, key: &str, value: &str) {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            warn!(key, error = %err, "failed to create cache directory");
            return;
        }
        if let Err(err) = fs::write(self.path_for(key), value) {
            warn!(key, error = %err, "failed to save cache state");
        }
    }
}

/// In-memory store for tests and embedders without a filesystem.
/// Clones share the same underlying map.
#[derive(Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl CacheStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }
}
