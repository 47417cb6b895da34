//! In-memory presigned-URL cache with persisted state and TTL invalidation.
//!
//! The map is owned by a single UI task; there are no concurrent writers.
//! Entries older than the max age are swept out so the UI never serves a
//! near-expired link; a file whose fetch failed lands in an error set so
//! the UI offers a manual retry instead of silently retrying forever.

use crate::client::{
    fetcher::{FetchError, FileUrlFetcher},
    storage::{CacheStore, TIMESTAMP_CACHE_KEY, URL_CACHE_KEY},
};
use futures::future::join_all;
use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};
use tracing::{debug, warn};

/// Entries older than this are considered stale (well inside the server's
/// 24 h presign TTL).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// How often a host UI should run [`UrlCache::invalidate_stale`].
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Concurrency window for batch hydration.
const HYDRATE_BATCH_SIZE: usize = 5;

/// Time source, injected so tests can move the clock.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// What the UI knows about a file when asking for hydration.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub id: String,
    pub mime_type: Option<String>,
}

/// Counts from one hydration pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HydrationReport {
    pub fetched: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct UrlCache<F: FileUrlFetcher> {
    urls: HashMap<String, String>,
    timestamps: HashMap<String, u64>,
    errors: HashSet<String>,
    storage: Box<dyn CacheStore + Send>,
    clock: Box<dyn Clock>,
    fetcher: F,
}

impl<F: FileUrlFetcher> UrlCache<F> {
    /// Build a cache seeded from whatever state the store holds. Corrupt
    /// state is discarded with a warning; the cache is re-derivable.
    pub fn new(storage: Box<dyn CacheStore + Send>, clock: Box<dyn Clock>, fetcher: F) -> Self {
        let urls = load_map(&*storage, URL_CACHE_KEY);
        let timestamps = load_map(&*storage, TIMESTAMP_CACHE_KEY);
        Self {
            urls,
            timestamps,
            errors: HashSet::new(),
            storage,
            clock,
            fetcher,
        }
    }

    /// Synchronous lookup; never triggers a fetch.
    pub fn get(&self, file_id: &str) -> Option<&str> {
        self.urls.get(file_id).map(String::as_str)
    }

    /// Whether this file's last fetch failed and awaits a manual retry.
    pub fn has_error(&self, file_id: &str) -> bool {
        self.errors.contains(file_id)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Drop a single entry, forcing the next hydration to re-fetch it.
    pub fn invalidate(&mut self, file_id: &str) {
        self.urls.remove(file_id);
        self.timestamps.remove(file_id);
        self.errors.remove(file_id);
        self.persist();
    }

    /// Fetch a fresh URL for one file, replacing whatever was cached.
    /// A success clears the file from the error set; a failure adds it.
    pub async fn refresh(&mut self, file_id: &str) -> Result<String, FetchError> {
        match self.fetcher.fetch_url(file_id).await {
            Ok(url) => {
                self.record_success(file_id, url.clone());
                self.persist();
                Ok(url)
            }
            Err(err) => {
                warn!(file_id, error = %err, "failed to refresh presigned URL");
                self.errors.insert(file_id.to_string());
                self.persist();
                Err(err)
            }
        }
    }

    /// Sweep entries older than `max_age` according to the timestamp
    /// side-table. Entries with no recorded timestamp are treated as stale.
    pub fn invalidate_stale(&mut self, max_age: Duration) {
        let now = self.clock.now_millis();
        let cutoff = now.saturating_sub(max_age.as_millis() as u64);
        let before = self.urls.len();

        self.urls.retain(|id, _| {
            self.timestamps
                .get(id)
                .is_some_and(|&inserted| inserted >= cutoff)
        });
        self.timestamps.retain(|_, &mut inserted| inserted >= cutoff);

        if self.urls.len() != before {
            debug!(pruned = before - self.urls.len(), "pruned stale URL cache entries");
            self.persist();
        }
    }

    /// Batch hydration: fetch presigned URLs for image files that have no
    /// cached URL and are not sitting in the error set, in windows of
    /// [`HYDRATE_BATCH_SIZE`]. Settle-all semantics: one file's failure
    /// never blocks the others in its window.
    pub async fn hydrate(&mut self, files: &[FileDescriptor]) -> HydrationReport {
        let mut report = HydrationReport::default();

        let to_fetch: Vec<&FileDescriptor> = files
            .iter()
            .filter(|file| {
                let is_image = file
                    .mime_type
                    .as_deref()
                    .is_some_and(|mime| mime.starts_with("image/"));
                if !is_image || self.urls.contains_key(&file.id) || self.errors.contains(&file.id)
                {
                    report.skipped += 1;
                    return false;
                }
                true
            })
            .collect();

        for batch in to_fetch.chunks(HYDRATE_BATCH_SIZE) {
            let results = join_all(
                batch
                    .iter()
                    .map(|file| self.fetcher.fetch_url(&file.id)),
            )
            .await;

            for (file, result) in batch.iter().zip(results) {
                match result {
                    Ok(url) => {
                        self.record_success(&file.id, url);
                        report.fetched += 1;
                    }
                    Err(err) => {
                        warn!(file_id = file.id, error = %err, "failed to hydrate presigned URL");
                        self.errors.insert(file.id.clone());
                        report.failed += 1;
                    }
                }
            }
            self.persist();
        }

        report
    }

    fn record_success(&mut self, file_id: &str, url: String) {
        self.urls.insert(file_id.to_string(), url);
        self.timestamps
            .insert(file_id.to_string(), self.clock.now_millis());
        self.errors.remove(file_id);
    }

    /// Write both maps back to the injected store. Best-effort.
    fn persist(&mut self) {
        match serde_json::to_string(&self.urls) {
            Ok(serialized) => self.storage.save(URL_CACHE_KEY, &serialized),
            Err(err) => warn!(error = %err, "failed to serialize URL cache"),
        }
        match serde_json::to_string(&self.timestamps) {
            Ok(serialized) => self.storage.save(TIMESTAMP_CACHE_KEY, &serialized),
            Err(err) => warn!(error = %err, "failed to serialize URL cache timestamps"),
        }
    }
}

fn load_map<V: serde::de::DeserializeOwned>(
    storage: &(dyn CacheStore + Send),
    key: &str,
) -> HashMap<String, V> {
    let Some(raw) = storage.load(key) else {
        return HashMap::new();
    };
    match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(err) => {
            warn!(key, error = %err, "discarding corrupt cache state");
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::MemoryStore;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    };

    struct ManualClock(Arc<AtomicU64>);

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Fetcher that succeeds for every id except those listed as failing.
    #[derive(Default, Clone)]
    struct StubFetcher {
        failing: Arc<Mutex<Vec<String>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl StubFetcher {
        fn failing(ids: &[&str]) -> Self {
            Self {
                failing: Arc::new(Mutex::new(ids.iter().map(|id| id.to_string()).collect())),
                calls: Arc::default(),
            }
        }
    }

    impl FileUrlFetcher for StubFetcher {
        async fn fetch_url(&self, file_id: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(file_id.to_string());
            if self.failing.lock().unwrap().iter().any(|id| id == file_id) {
                Err(FetchError::Rejected("boom".into()))
            } else {
                Ok(format!("http://store.local/objects/b/{file_id}?signature=sig"))
            }
        }
    }

    fn cache_at(
        now: Arc<AtomicU64>,
        fetcher: StubFetcher,
    ) -> UrlCache<StubFetcher> {
        UrlCache::new(
            Box::new(MemoryStore::default()),
            Box::new(ManualClock(now)),
            fetcher,
        )
    }

    fn image(id: &str) -> FileDescriptor {
        FileDescriptor {
            id: id.into(),
            mime_type: Some("image/png".into()),
        }
    }

    #[tokio::test]
    async fn stale_entries_are_pruned_fresh_ones_retained() {
        let now = Arc::new(AtomicU64::new(0));
        let mut cache = cache_at(now.clone(), StubFetcher::default());

        cache.refresh("old-file").await.unwrap();
        // Two hours pass, then a fresh entry arrives.
        now.store(2 * 60 * 60 * 1000, Ordering::SeqCst);
        cache.refresh("new-file").await.unwrap();

        cache.invalidate_stale(Duration::from_secs(60 * 60));

        assert!(cache.get("old-file").is_none());
        assert!(cache.get("new-file").is_some());
    }

    #[tokio::test]
    async fn hydrate_settles_every_file_despite_failures() {
        let now = Arc::new(AtomicU64::new(0));
        let mut cache = cache_at(now, StubFetcher::failing(&["f2"]));

        let report = cache
            .hydrate(&[image("f1"), image("f2"), image("f3")])
            .await;

        assert_eq!(report, HydrationReport { fetched: 2, failed: 1, skipped: 0 });
        assert!(cache.get("f1").is_some());
        assert!(cache.get("f2").is_none());
        assert!(cache.has_error("f2"));
        assert!(cache.get("f3").is_some());
    }

    #[tokio::test]
    async fn hydrate_skips_cached_errored_and_non_image_files() {
        let now = Arc::new(AtomicU64::new(0));
        let fetcher = StubFetcher::failing(&["bad"]);
        let calls = fetcher.calls.clone();
        let mut cache = cache_at(now, fetcher);

        cache.refresh("cached").await.unwrap();
        cache.hydrate(&[image("bad")]).await;
        calls.lock().unwrap().clear();

        let report = cache
            .hydrate(&[
                image("cached"),
                image("bad"),
                FileDescriptor { id: "doc".into(), mime_type: Some("application/pdf".into()) },
                FileDescriptor { id: "unknown".into(), mime_type: None },
                image("fresh"),
            ])
            .await;

        assert_eq!(report, HydrationReport { fetched: 1, failed: 0, skipped: 4 });
        assert_eq!(*calls.lock().unwrap(), vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn refresh_clears_a_previous_error() {
        let now = Arc::new(AtomicU64::new(0));
        let fetcher = StubFetcher::failing(&["f1"]);
        let mut cache = cache_at(now, fetcher.clone());

        assert!(cache.refresh("f1").await.is_err());
        assert!(cache.has_error("f1"));

        // The backend recovers; a manual retry should succeed and clear
        // the error flag.
        fetcher.failing.lock().unwrap().clear();
        let url = cache.refresh("f1").await.unwrap();
        assert!(url.contains("signature="));
        assert!(!cache.has_error("f1"));
        assert_eq!(cache.get("f1"), Some(url.as_str()));
    }

    #[tokio::test]
    async fn state_round_trips_through_the_store() {
        let now = Arc::new(AtomicU64::new(42));
        let store = MemoryStore::default();
        let mut cache = UrlCache::new(
            Box::new(store.clone()),
            Box::new(ManualClock(now.clone())),
            StubFetcher::default(),
        );
        cache.refresh("f1").await.unwrap();
        let url = cache.get("f1").unwrap().to_string();
        drop(cache);

        // A new cache over the same store sees the persisted entry
        // without any fetch.
        let revived = UrlCache::new(
            Box::new(store),
            Box::new(ManualClock(now)),
            StubFetcher::failing(&["f1"]),
        );
        assert_eq!(revived.get("f1"), Some(url.as_str()));
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let now = Arc::new(AtomicU64::new(0));
        let fetcher = StubFetcher::default();
        let calls = fetcher.calls.clone();
        let mut cache = cache_at(now, fetcher);

        cache.refresh("f1").await.unwrap();
        cache.invalidate("f1");
        assert!(cache.get("f1").is_none());

        calls.lock().unwrap().clear();
        let report = cache.hydrate(&[image("f1")]).await;
        assert_eq!(report.fetched, 1);
        assert_eq!(*calls.lock().unwrap(), vec!["f1".to_string()]);
    }
}
