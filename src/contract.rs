//! The contract every blob backend satisfies.

use crate::error::Result;
use crate::types::{
    BlobId, BlobProperties, BlobSource, FetchOptions, FetchedBlob, ListOptions, ListingPage,
    Permission,
};
use chrono::Utc;
use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

/// Content-addressed blob storage.
///
/// Every operation addressing a missing identifier fails with
/// [`StoreError::BlobNotFound`](crate::StoreError::BlobNotFound), except
/// [`exists`](BlobStore::exists) which reports `false`.
pub trait BlobStore: Send + Sync {
    /// Store content, returning its properties.
    ///
    /// Storing content that is already present returns the existing
    /// properties unchanged, including the original `created_at`.
    fn store(&self, content: BlobSource<'_>) -> Result<BlobProperties>;

    /// Fetch content, optionally restricted to a byte range.
    ///
    /// `properties.size` is always the total stored size.
    fn fetch(&self, id: &BlobId, options: FetchOptions) -> Result<FetchedBlob>;

    /// Open a single-pass reader over the full content.
    fn fetch_stream(&self, id: &BlobId) -> Result<BlobStream>;

    fn exists(&self, id: &BlobId) -> bool;

    fn properties(&self, id: &BlobId) -> Result<BlobProperties>;

    /// Remove content and metadata together.
    fn delete(&self, id: &BlobId) -> Result<()>;

    /// List blobs ordered by identifier.
    fn list(&self, options: &ListOptions) -> Result<ListingPage>;

    /// Issue a placeholder URL embedding identifier, expiry and permission.
    fn signed_url(&self, id: &BlobId, expires_in: Duration, permission: Permission)
        -> Result<String>;

    /// Remove every blob. Test setup and teardown only.
    fn clear(&self) -> Result<()>;

    /// Number of stored blobs. Test setup and teardown only.
    fn count(&self) -> Result<usize>;
}

/// Build `<scheme>://<id>?expires=<epoch-millis>&permissions=<permission>`.
pub(crate) fn placeholder_url(
    scheme: &str,
    id: &BlobId,
    expires_in: Duration,
    permission: Permission,
) -> String {
    let expires_in = i64::try_from(expires_in.as_millis()).unwrap_or(i64::MAX);
    let expires = Utc::now().timestamp_millis().saturating_add(expires_in);
    format!(
        "{}://{}?expires={}&permissions={}",
        scheme, id, expires, permission
    )
}

/// Largest up-front allocation `read_all` makes from the reported size.
const READ_HINT_LIMIT: u64 = 1 << 20;

/// Lazy reader over a blob's content.
///
/// Owned by the caller and not restartable once consumed.
pub struct BlobStream {
    inner: Box<dyn Read + Send>,
    size: u64,
}

impl BlobStream {
    pub(crate) fn new(reader: impl Read + Send + 'static, size: u64) -> Self {
        Self {
            inner: Box::new(reader),
            size,
        }
    }

    /// Total size of the underlying blob.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Drain the rest of the stream into a buffer.
    pub fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size.min(READ_HINT_LIMIT) as usize);
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Consume the stream as a sequence of chunks of at most `chunk_size` bytes.
    pub fn chunks(self, chunk_size: usize) -> Chunks {
        Chunks {
            stream: self,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }
}

impl Read for BlobStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Debug for BlobStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStream").field("size", &self.size).finish()
    }
}

/// Iterator returned by [`BlobStream::chunks`].
pub struct Chunks {
    stream: BlobStream,
    chunk_size: usize,
    done: bool,
}

impl Iterator for Chunks {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = Vec::with_capacity(self.chunk_size);
        let limit = self.chunk_size as u64;
        match (&mut self.stream).take(limit).read_to_end(&mut chunk) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(chunk)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
