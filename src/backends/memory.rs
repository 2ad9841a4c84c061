//! Volatile in-memory backend.

use crate::address::{ContentAddresser, Sha256Addresser};
use crate::contract::{placeholder_url, BlobStore, BlobStream};
use crate::error::{Result, StoreError};
use crate::listing::paginate;
use crate::types::{
    BlobId, BlobProperties, BlobSource, FetchOptions, FetchedBlob, ListOptions, ListingPage,
    Permission,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// URL scheme used for placeholder signed URLs.
const URL_SCHEME: &str = "memory";

/// A stored blob. Content is immutable once inserted.
struct StoredEntry {
    properties: BlobProperties,
    content: Arc<[u8]>,
}

/// Blob store held entirely in process memory.
///
/// Each instance owns its own map; nothing survives the instance.
pub struct MemoryBackend<A = Sha256Addresser> {
    addresser: A,
    entries: RwLock<HashMap<BlobId, StoredEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_addresser(Sha256Addresser)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ContentAddresser> MemoryBackend<A> {
    pub fn with_addresser(addresser: A) -> Self {
        Self {
            addresser,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, id: &BlobId) -> Result<(BlobProperties, Arc<[u8]>)> {
        let entries = self.entries.read();
        let entry = entries
            .get(id)
            .ok_or_else(|| StoreError::BlobNotFound(id.clone()))?;
        Ok((entry.properties.clone(), Arc::clone(&entry.content)))
    }
}

impl<A: ContentAddresser> BlobStore for MemoryBackend<A> {
    #[instrument(skip_all)]
    fn store(&self, content: BlobSource<'_>) -> Result<BlobProperties> {
        let content = content.into_bytes()?;
        let id = self.addresser.address(&content);
        if !id.is_well_formed() {
            return Err(StoreError::InvalidIdentifier(id));
        }

        if let Some(existing) = self.entries.read().get(&id) {
            debug!(id = ?id, "blob already exists");
            return Ok(existing.properties.clone());
        }

        // Re-check under the write lock so concurrent stores create one entry.
        let mut entries = self.entries.write();
        match entries.entry(id) {
            Entry::Occupied(existing) => Ok(existing.get().properties.clone()),
            Entry::Vacant(slot) => {
                let properties = BlobProperties {
                    identifier: slot.key().clone(),
                    size: content.len() as u64,
                    created_at: Utc::now(),
                };
                debug!(id = ?properties.identifier, size = properties.size, "stored blob");
                slot.insert(StoredEntry {
                    properties: properties.clone(),
                    content: Arc::from(&*content),
                });
                Ok(properties)
            }
        }
    }

    fn fetch(&self, id: &BlobId, options: FetchOptions) -> Result<FetchedBlob> {
        let (properties, content) = self.entry(id)?;
        let content = match options.range {
            Some(range) => {
                let range = range.resolve(properties.size);
                content[range.start as usize..range.end as usize].to_vec()
            }
            None => content.to_vec(),
        };
        Ok(FetchedBlob {
            content,
            properties,
        })
    }

    fn fetch_stream(&self, id: &BlobId) -> Result<BlobStream> {
        let (properties, content) = self.entry(id)?;
        Ok(BlobStream::new(Cursor::new(content), properties.size))
    }

    fn exists(&self, id: &BlobId) -> bool {
        id.is_well_formed() && self.entries.read().contains_key(id)
    }

    fn properties(&self, id: &BlobId) -> Result<BlobProperties> {
        self.entries
            .read()
            .get(id)
            .map(|entry| entry.properties.clone())
            .ok_or_else(|| StoreError::BlobNotFound(id.clone()))
    }

    #[instrument(skip(self))]
    fn delete(&self, id: &BlobId) -> Result<()> {
        match self.entries.write().remove(id) {
            Some(_) => {
                debug!("deleted blob");
                Ok(())
            }
            None => Err(StoreError::BlobNotFound(id.clone())),
        }
    }

    fn list(&self, options: &ListOptions) -> Result<ListingPage> {
        let items = self
            .entries
            .read()
            .values()
            .map(|entry| entry.properties.clone())
            .collect();
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
        self.entries.write().clear();
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }
}
