//! Per-identifier locks.
//!
//! Slots are created on first use and dropped from the table as soon as the
//! last holder releases them, so the table only ever holds contended keys.

use crate::types::BlobId;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct KeyedLocks {
    table: Mutex<HashMap<BlobId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Block until the lock for `id` is held.
    pub(crate) fn lock(&self, id: &BlobId) -> KeyedGuard<'_> {
        let slot = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(id.clone()).or_default())
        };

        KeyedGuard {
            locks: self,
            id: id.clone(),
            guard: Some(slot.lock_arc()),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().len()
    }
}

pub(crate) struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    id: BlobId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        // Release the slot before inspecting the table; the guard owns a
        // reference to it.
        drop(self.guard.take());

        let mut table = self.locks.table.lock();
        if let Some(slot) = table.get(&self.id) {
            // Clones are only taken under the table lock, so a count of one
            // means nobody is waiting.
            if Arc::strong_count(slot) == 1 {
                table.remove(&self.id);
            }
        }
    }
}
