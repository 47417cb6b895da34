//! Client-side companion for the gallery UI: a presigned-URL cache with
//! persisted state, TTL-based invalidation, and batched hydration.
//!
//! Presigned URLs expire server-side after 24 hours, so the cache treats
//! entries as stale well before that (1 hour by default) and re-fetches on
//! demand. Storage, clock, and fetch transport are injected so embedders
//! and tests control all three.

pub mod fetcher;
pub mod storage;
pub mod url_cache;
