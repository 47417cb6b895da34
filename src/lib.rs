//! Image-gallery backend for the travel-agency back office.
//!
//! Folder and file metadata live in SQLite; payload bytes live in a
//! disk-backed object store addressed by derived bucket names; reads happen
//! through presigned, signature-bearing URLs. The `client` module is the
//! browser-side companion: a persisted presigned-URL cache with TTL
//! invalidation and batched hydration.

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
