//! Mapping identifiers to paths.

use crate::types::BlobId;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

/// Extension of content files.
pub const CONTENT_EXTENSION: &str = "content";

/// Extension of metadata sidecar files.
pub const METADATA_EXTENSION: &str = "meta";

/// Identifier characters used for sharding.
const SHARD_CHARS: usize = 8;

/// Characters per shard directory level.
const SHARD_WIDTH: usize = 2;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory layout under a storage root.
#[derive(Clone, Debug)]
pub(crate) struct Layout {
    root: PathBuf,
}

impl Layout {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Shard directory for an identifier. Callers must pass a well-formed id.
    pub(crate) fn shard_dir(&self, id: &BlobId) -> PathBuf {
        let mut dir = self.root.clone();
        for component in shard_components(id.as_str()) {
            dir.push(component);
        }
        dir
    }

    pub(crate) fn content_path(&self, id: &BlobId) -> PathBuf {
        self.shard_dir(id)
            .join(format!("{}.{}", id, CONTENT_EXTENSION))
    }

    pub(crate) fn metadata_path(&self, id: &BlobId) -> PathBuf {
        self.shard_dir(id)
            .join(format!("{}.{}", id, METADATA_EXTENSION))
    }

    /// Unique sibling path for writing `target` before renaming it into place.
    ///
    /// Temp names start with a dot and never end in a known extension, so
    /// scans ignore them.
    pub(crate) fn temp_path(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        target.with_file_name(format!(".{}.tmp-{}-{}", name, process::id(), n))
    }
}

/// Up to the first eight characters, split into pairs.
pub(crate) fn shard_components(id: &str) -> impl Iterator<Item = &str> {
    let prefix = &id[..id.len().min(SHARD_CHARS)];
    (0..prefix.len())
        .step_by(SHARD_WIDTH)
        .map(move |i| &prefix[i..(i + SHARD_WIDTH).min(prefix.len())])
}

/// Identifier named by a file with the given extension, if any.
pub(crate) fn id_from_file_name(path: &Path, extension: &str) -> Option<BlobId> {
    if path.extension()? != extension {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let id = BlobId::new(stem);
    id.is_well_formed().then_some(id)
}
