//! # Blob Store
//!
//! Content-addressed blob storage behind one contract, [`BlobStore`], with
//! two interchangeable backends.
//!
//! ## Core Concepts
//!
//! - **Identifiers**: derived from content by a [`ContentAddresser`]
//!   (SHA-256 by default); identical content is stored once
//! - **Properties**: identifier, total size and first-write time
//! - **Listing**: identifier-ordered pages with prefix filter and cursor
//! - **Backends**: [`MemoryBackend`] (volatile) and [`FsBackend`]
//!   (sharded directory tree with JSON sidecars)
//!
//! ## Example
//!
//! ```no_run
//! use bstore::{BlobStore, FetchOptions, FsBackend, FsConfig, ListOptions};
//!
//! let store = FsBackend::open(FsConfig::new("./my-blobs"))?;
//!
//! let props = store.store("console.log('hello');".into())?;
//! let part = store.fetch(&props.identifier, FetchOptions::range(0, 7))?;
//! assert_eq!(part.content, b"console");
//!
//! let page = store.list(&ListOptions::default().with_max_results(10))?;
//! # Ok::<(), bstore::StoreError>(())
//! ```

pub mod address;
pub mod backends;
pub mod config;
pub mod contract;
pub mod error;
pub mod listing;
mod locks;
pub mod types;

// Re-exports
pub use address::{ContentAddresser, Sha256Addresser};
pub use backends::{FsBackend, MemoryBackend};
pub use config::{open_backend, BackendConfig, FsConfig};
pub use contract::{BlobStore, BlobStream, Chunks};
pub use error::{Result, StoreError};
pub use types::*;
