//! Data models for the blob store.
//!
//! `FileInfo` is the metadata ("info") record persisted next to each payload,
//! and `ObjectState` is the lifecycle stage derived from which records exist.

pub mod file_info;
pub mod object_state;
