//! Persistent filesystem backend.
//!
//! Blobs are sharded into nested directories by the first eight characters
//! of their identifier, two characters per level:
//!
//! ```text
//! <root>/ab/c1/23/de/<id>.content
//! <root>/ab/c1/23/de/<id>.meta
//! ```
//!
//! The `.meta` sidecar is a JSON record holding the blob's properties.

mod layout;
mod sidecar;
mod storage;

pub use layout::{CONTENT_EXTENSION, METADATA_EXTENSION};
pub use storage::FsBackend;
