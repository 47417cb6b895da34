//! Core data models for the image-gallery service.
//!
//! A folder is an application-level grouping of image files, mapped 1:1 to a
//! physical bucket in the object store. Both entities map cleanly to database
//! tables via `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod file;
pub mod folder;
