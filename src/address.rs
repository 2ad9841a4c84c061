//! Content addressing.

use crate::types::BlobId;
use sha2::{Digest, Sha256};

/// Maps content to a stable identifier.
///
/// Implementations must be deterministic and produce fixed-length,
/// well-formed identifiers (see [`BlobId::is_well_formed`]).
pub trait ContentAddresser: Send + Sync {
    fn address(&self, content: &[u8]) -> BlobId;
}

/// SHA-256, hex encoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Addresser;

impl ContentAddresser for Sha256Addresser {
    fn address(&self, content: &[u8]) -> BlobId {
        let mut hasher = Sha256::new();
        hasher.update(content);
        BlobId::new(hex::encode(hasher.finalize()))
    }
}
