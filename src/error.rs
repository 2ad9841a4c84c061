//! Error types for blob store operations.

use crate::types::BlobId;
use thiserror::Error;

/// Main error type for blob store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob not found: {0}")]
    BlobNotFound(BlobId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The addresser produced an identifier outside `[A-Za-z0-9_-]+`.
    #[error("Invalid identifier: \"{0}\"")]
    InvalidIdentifier(BlobId),
}

impl StoreError {
    /// True for the not-found signal shared by every contract operation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::BlobNotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            StoreError::Deserialization(e.to_string())
        } else {
            StoreError::Serialization(e.to_string())
        }
    }
}

/// Result type for blob store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
