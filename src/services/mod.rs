//! Service layer: name derivation, storage, persistence, validation, and
//! the orchestration that ties them together.

pub mod bucket_name;
pub mod gallery;
pub mod metadata_store;
pub mod object_store;
pub mod upload_policy;
