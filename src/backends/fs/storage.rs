//! Filesystem backend implementation.

use super::layout::{id_from_file_name, Layout, CONTENT_EXTENSION, METADATA_EXTENSION};
use super::sidecar::SidecarRecord;
use crate::address::{ContentAddresser, Sha256Addresser};
use crate::config::FsConfig;
use crate::contract::{placeholder_url, BlobStore, BlobStream};
use crate::error::{Result, StoreError};
use crate::listing::paginate;
use crate::locks::KeyedLocks;
use crate::types::{
    BlobId, BlobProperties, BlobSource, FetchOptions, FetchedBlob, ListOptions, ListingPage,
    Permission,
};
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// URL scheme used for placeholder signed URLs.
const URL_SCHEME: &str = "file";

/// Blob store persisted in a sharded directory tree.
pub struct FsBackend<A = Sha256Addresser> {
    config: FsConfig,
    layout: Layout,
    addresser: A,

    /// Recently used sidecar records.
    cache: Mutex<LruCache<BlobId, SidecarRecord>>,

    /// Serializes writers and deleters of the same identifier.
    locks: KeyedLocks,
}

impl FsBackend {
    /// Open a backend rooted at `config.path`.
    pub fn open(config: FsConfig) -> Result<Self> {
        Self::open_with_addresser(config, Sha256Addresser)
    }

    /// Open with default settings at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(FsConfig::new(path))
    }
}

impl<A: ContentAddresser> FsBackend<A> {
    pub fn open_with_addresser(config: FsConfig, addresser: A) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(StoreError::InvalidConfig(format!(
                    "storage root {} does not exist",
                    config.path.display()
                )));
            }
            fs::create_dir_all(&config.path)?;
        } else if !config.path.is_dir() {
            return Err(StoreError::InvalidConfig(format!(
                "storage root {} is not a directory",
                config.path.display()
            )));
        }

        let cache_size = NonZeroUsize::new(config.cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        info!(path = %config.path.display(), "filesystem blob store opened");

        Ok(Self {
            layout: Layout::new(&config.path),
            config,
            addresser,
            cache: Mutex::new(LruCache::new(cache_size)),
            locks: KeyedLocks::new(),
        })
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Write `bytes` to a temporary sibling, then rename it onto `path`.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let temp = Layout::temp_path(path);
        let result = (|| -> io::Result<()> {
            let mut file = match File::create(&temp) {
                // A concurrent delete may have pruned the shard directory.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if let Some(parent) = temp.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    File::create(&temp)?
                }
                file => file?,
            };
            file.write_all(bytes)?;
            if self.config.sync_writes {
                file.sync_all()?;
            }
            fs::rename(&temp, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        Ok(result?)
    }

    /// Load the sidecar for a blob whose content is known to exist.
    fn record(&self, id: &BlobId) -> Result<SidecarRecord> {
        Ok(self.load_record(id)?.0)
    }

    /// Load the sidecar for a blob, also reporting whether it had to be
    /// rebuilt.
    ///
    /// A sidecar that is missing, unreadable, names another blob or disagrees
    /// with the content file's length is replaced by properties rebuilt from
    /// the content file. Rebuilt records are never cached.
    fn load_record(&self, id: &BlobId) -> Result<(SidecarRecord, bool)> {
        if !id.is_well_formed() {
            return Err(StoreError::BlobNotFound(id.clone()));
        }

        let content_path = self.layout.content_path(id);
        let metadata = match fs::metadata(&content_path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(StoreError::BlobNotFound(id.clone())),
            Err(e) => return Err(self.not_found_or(id, e)),
        };

        if let Some(record) = self.cache.lock().get(id).cloned() {
            if record.properties.size == metadata.len() {
                return Ok((record, false));
            }
        }

        let loaded = match SidecarRecord::load(&self.layout.metadata_path(id)) {
            Ok(Some(record)) if &record.properties.identifier != id => {
                warn!(
                    id = ?id,
                    found = ?record.properties.identifier,
                    "sidecar names another blob, rebuilding properties"
                );
                None
            }
            Ok(Some(record)) if record.properties.size != metadata.len() => {
                warn!(
                    id = ?id,
                    recorded = record.properties.size,
                    actual = metadata.len(),
                    "sidecar size disagrees with content, rebuilding properties"
                );
                None
            }
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                warn!(id = ?id, "sidecar missing, rebuilding properties");
                None
            }
            Err(StoreError::Deserialization(error)) => {
                warn!(id = ?id, %error, "sidecar malformed, rebuilding properties");
                None
            }
            Err(e) => return Err(e),
        };

        match loaded {
            Some(record) => {
                self.cache.lock().put(id.clone(), record.clone());
                Ok((record, false))
            }
            None => Ok((Self::synthesize(id, &metadata), true)),
        }
    }

    /// Properties derived from the content file alone.
    fn synthesize(id: &BlobId, metadata: &fs::Metadata) -> SidecarRecord {
        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        SidecarRecord {
            properties: BlobProperties {
                identifier: id.clone(),
                size: metadata.len(),
                created_at,
            },
            checksum: None,
        }
    }

    /// Open the content file, mapping a vanished file to `BlobNotFound`.
    fn open_content(&self, id: &BlobId) -> Result<File> {
        File::open(self.layout.content_path(id)).map_err(|e| self.not_found_or(id, e))
    }

    fn not_found_or(&self, id: &BlobId, e: io::Error) -> StoreError {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::BlobNotFound(id.clone())
        } else {
            StoreError::Io(e)
        }
    }

    /// Remove now-empty shard directories above `path`, stopping at the root.
    fn prune_empty_shards(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.layout.root() || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    /// Every file under the root with the given extension.
    fn scan(&self, extension: &'static str) -> impl Iterator<Item = (BlobId, PathBuf)> + '_ {
        WalkDir::new(self.layout.root())
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!(%error, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let id = id_from_file_name(entry.path(), extension)?;
                Some((id, entry.into_path()))
            })
    }
}

impl<A: ContentAddresser> BlobStore for FsBackend<A> {
    #[instrument(skip_all)]
    fn store(&self, content: BlobSource<'_>) -> Result<BlobProperties> {
        let content = content.into_bytes()?;
        let id = self.addresser.address(&content);
        if !id.is_well_formed() {
            return Err(StoreError::InvalidIdentifier(id));
        }

        let _guard = self.locks.lock(&id);

        let content_path = self.layout.content_path(&id);
        let metadata_path = self.layout.metadata_path(&id);

        if content_path.is_file() {
            debug!(id = ?id, "blob already exists");
            let (mut record, rebuilt) = self.load_record(&id)?;
            if rebuilt {
                record.checksum = Some(crc32fast::hash(&content));
                self.write_atomic(&metadata_path, &record.encode()?)?;
                self.cache.lock().put(id, record.clone());
                info!(id = ?record.properties.identifier, "restored sidecar");
            }
            return Ok(record.properties);
        }

        fs::create_dir_all(self.layout.shard_dir(&id))?;

        let record = SidecarRecord {
            properties: BlobProperties {
                identifier: id.clone(),
                size: content.len() as u64,
                created_at: Utc::now(),
            },
            checksum: Some(crc32fast::hash(&content)),
        };

        // Content first; a sidecar never names content that isn't there.
        self.write_atomic(&content_path, &content)?;
        self.write_atomic(&metadata_path, &record.encode()?)?;

        debug!(id = ?id, size = record.properties.size, "stored blob");
        self.cache.lock().put(id, record.clone());
        Ok(record.properties)
    }

    fn fetch(&self, id: &BlobId, options: FetchOptions) -> Result<FetchedBlob> {
        let record = self.record(id)?;
        let mut file = self.open_content(id)?;

        let content = match options.range {
            Some(range) => {
                let range = range.resolve(record.properties.size);
                let mut buf = Vec::new();
                file.seek(SeekFrom::Start(range.start))?;
                file.take(range.end - range.start).read_to_end(&mut buf)?;
                buf
            }
            None => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)?;

                if let Some(expected) = record.checksum {
                    let got = crc32fast::hash(&buf);
                    if got != expected {
                        warn!(id = ?id, expected, got, "content checksum mismatch");
                        return Err(StoreError::ChecksumMismatch { expected, got });
                    }
                }
                buf
            }
        };

        Ok(FetchedBlob {
            content,
            properties: record.properties,
        })
    }

    fn fetch_stream(&self, id: &BlobId) -> Result<BlobStream> {
        let record = self.record(id)?;
        let file = self.open_content(id)?;
        Ok(BlobStream::new(BufReader::new(file), record.properties.size))
    }

    fn exists(&self, id: &BlobId) -> bool {
        id.is_well_formed() && self.layout.content_path(id).is_file()
    }

    fn properties(&self, id: &BlobId) -> Result<BlobProperties> {
        Ok(self.record(id)?.properties)
    }

    #[instrument(skip(self))]
    fn delete(&self, id: &BlobId) -> Result<()> {
        if !id.is_well_formed() {
            return Err(StoreError::BlobNotFound(id.clone()));
        }

        let _guard = self.locks.lock(id);
        self.cache.lock().pop(id);

        let content_path = self.layout.content_path(id);
        let metadata_path = self.layout.metadata_path(id);

        // Sidecar goes first so listings never report content that is gone.
        // A missing sidecar is fine; a missing content file is not.
        let content_present = content_path.is_file();
        match fs::remove_file(&metadata_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if !content_present {
            self.prune_empty_shards(&content_path);
            return Err(StoreError::BlobNotFound(id.clone()));
        }

        fs::remove_file(&content_path).map_err(|e| self.not_found_or(id, e))?;
        self.prune_empty_shards(&content_path);

        debug!("deleted blob");
        Ok(())
    }

    #[instrument(skip(self))]
    fn list(&self, options: &ListOptions) -> Result<ListingPage> {
        let mut items = Vec::new();

        for (id, path) in self.scan(METADATA_EXTENSION) {
            if let Some(prefix) = options.prefix.as_deref() {
                if !id.as_str().starts_with(prefix) {
                    continue;
                }
            }

            match SidecarRecord::load(&path) {
                Ok(Some(record)) if record.properties.identifier == id => {
                    if self.layout.content_path(&id).is_file() {
                        items.push(record.properties);
                    }
                }
                Ok(Some(_)) => {
                    warn!(path = %path.display(), "skipping sidecar naming another blob");
                }
                // Deleted between the scan and the read.
                Ok(None) => {}
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable sidecar");
                }
            }
        }

        Ok(paginate(items, options))
    }

    fn signed_url(
        &self,
        id: &BlobId,
        expires_in: Duration,
        permission: Permission,
    ) -> Result<String> {
        if !self.exists(id) {
            return Err(StoreError::BlobNotFound(id.clone()));
        }
        Ok(placeholder_url(URL_SCHEME, id, expires_in, permission))
    }

    fn clear(&self) -> Result<()> {
        self.cache.lock().clear();

        match fs::remove_dir_all(self.layout.root()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(self.layout.root())?;

        info!(path = %self.layout.root().display(), "cleared blob store");
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.scan(CONTENT_EXTENSION).count())
    }
}
