//! Core types for the blob store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::fmt;
use std::io::{self, Read};
use std::ops::Range;

/// Content-derived identifier for a blob.
///
/// Produced by a [`ContentAddresser`](crate::ContentAddresser); never mutated.
/// Ordering is byte-wise on the underlying string, which is the order every
/// listing uses.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(id: impl Into<String>) -> Self {
        BlobId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether this identifier could have been produced by an addresser.
    ///
    /// Only non-empty ASCII alphanumerics, `-` and `_` are accepted, which
    /// keeps every well-formed identifier safe to use as a path component.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get(..8) {
            Some(short) if self.0.len() > 8 => write!(f, "BlobId({}...)", short),
            _ => write!(f, "BlobId({})", self.0),
        }
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlobId {
    fn from(s: String) -> Self {
        BlobId(s)
    }
}

impl From<&str> for BlobId {
    fn from(s: &str) -> Self {
        BlobId(s.to_string())
    }
}

impl AsRef<str> for BlobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BlobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Attributes of a stored blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobProperties {
    pub identifier: BlobId,

    /// Total content length in bytes, regardless of any ranged read.
    pub size: u64,

    /// Set by the first write; later writes of identical content keep it.
    pub created_at: DateTime<Utc>,
}

/// Content handed to [`BlobStore::store`](crate::BlobStore::store).
///
/// Text is stored as its UTF-8 bytes. Readers are drained completely before
/// the content is addressed.
pub enum BlobSource<'a> {
    Bytes(Cow<'a, [u8]>),
    Reader(Box<dyn Read + Send + 'a>),
}

impl<'a> BlobSource<'a> {
    /// Wrap a byte stream.
    pub fn reader(reader: impl Read + Send + 'a) -> Self {
        BlobSource::Reader(Box::new(reader))
    }

    /// Materialize the content, draining a reader if necessary.
    pub fn into_bytes(self) -> io::Result<Cow<'a, [u8]>> {
        match self {
            BlobSource::Bytes(bytes) => Ok(bytes),
            BlobSource::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(Cow::Owned(buf))
            }
        }
    }
}

impl fmt::Debug for BlobSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobSource::Bytes(bytes) => write!(f, "BlobSource::Bytes({} bytes)", bytes.len()),
            BlobSource::Reader(_) => f.write_str("BlobSource::Reader(..)"),
        }
    }
}

impl<'a> From<&'a [u8]> for BlobSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        BlobSource::Bytes(Cow::Borrowed(bytes))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for BlobSource<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        BlobSource::Bytes(Cow::Borrowed(bytes.as_slice()))
    }
}

impl From<Vec<u8>> for BlobSource<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        BlobSource::Bytes(Cow::Owned(bytes))
    }
}

impl<'a> From<&'a str> for BlobSource<'a> {
    fn from(text: &'a str) -> Self {
        BlobSource::Bytes(Cow::Borrowed(text.as_bytes()))
    }
}

impl From<String> for BlobSource<'_> {
    fn from(text: String) -> Self {
        BlobSource::Bytes(Cow::Owned(text.into_bytes()))
    }
}

/// Half-open byte range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Clamp to content of `size` bytes. An inverted or out-of-bounds range
    /// resolves to an empty one.
    pub fn resolve(&self, size: u64) -> Range<u64> {
        let start = self.start.min(size);
        let end = self.end.min(size).max(start);
        start..end
    }
}

/// Options for [`BlobStore::fetch`](crate::BlobStore::fetch).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub range: Option<ByteRange>,
}

impl FetchOptions {
    /// Fetch only `[start, end)`.
    pub fn range(start: u64, end: u64) -> Self {
        Self {
            range: Some(ByteRange::new(start, end)),
        }
    }
}

/// Result of a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedBlob {
    pub content: Vec<u8>,
    pub properties: BlobProperties,
}

/// Options for [`BlobStore::list`](crate::BlobStore::list).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only identifiers starting with this prefix.
    pub prefix: Option<String>,

    /// Page size. `None` (or zero) returns every match in one page.
    pub max_results: Option<usize>,

    /// Resume strictly after this identifier.
    pub continuation_cursor: Option<BlobId>,
}

impl ListOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<BlobId>) -> Self {
        self.continuation_cursor = cursor;
        self
    }
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub items: Vec<BlobProperties>,

    /// Last identifier on this page when more results remain.
    pub continuation_cursor: Option<BlobId>,
}

/// Access granted by a signed URL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Read,
    Delete,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => f.write_str("read"),
            Permission::Delete => f.write_str("delete"),
        }
    }
}
