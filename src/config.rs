//! Backend configuration.

use crate::backends::{FsBackend, MemoryBackend};
use crate::contract::BlobStore;
use crate::error::Result;
use std::path::PathBuf;

/// Filesystem backend configuration.
#[derive(Clone, Debug)]
pub struct FsConfig {
    /// Root directory for shards.
    pub path: PathBuf,

    /// Metadata cache size (number of blobs).
    pub cache_size: usize,

    /// Whether to fsync content and sidecar files before renaming them into place.
    pub sync_writes: bool,

    /// Whether to create the root directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl FsConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./blobs"),
            cache_size: 1000,
            sync_writes: true,
            create_if_missing: true,
        }
    }
}

/// Which backend to open.
#[derive(Clone, Debug)]
pub enum BackendConfig {
    Memory,
    Filesystem(FsConfig),
}

/// Open the configured backend behind the common contract.
pub fn open_backend(config: BackendConfig) -> Result<Box<dyn BlobStore>> {
    match config {
        BackendConfig::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendConfig::Filesystem(fs) => Ok(Box::new(FsBackend::open(fs)?)),
    }
}
