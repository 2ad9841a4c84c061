//! Metadata sidecar records.

use crate::error::{Result, StoreError};
use crate::types::BlobProperties;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// On-disk metadata for one blob.
///
/// `checksum` was added after the first format; records without it are
/// still accepted and simply skip verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SidecarRecord {
    #[serde(flatten)]
    pub properties: BlobProperties,

    /// CRC-32 of the full content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<u32>,
}

impl SidecarRecord {
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
    }

    /// Read a sidecar. `Ok(None)` if the file doesn't exist.
    pub(crate) fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => Self::decode(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlobId;
    use chrono::{TimeZone, Utc};

    fn record(checksum: Option<u32>) -> SidecarRecord {
        SidecarRecord {
            properties: BlobProperties {
                identifier: BlobId::new("abc"),
                size: 10,
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            },
            checksum,
        }
    }

    #[test]
    fn test_encoded_fields() {
        let bytes = record(Some(42)).encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["identifier"], "abc");
        assert_eq!(value["size"], 10);
        assert_eq!(value["createdAt"], "2024-05-01T12:30:00Z");
        assert_eq!(value["checksum"], 42);
    }

    #[test]
    fn test_decodes_record_without_checksum() {
        let json = br#"{"identifier":"abc","size":10,"createdAt":"2024-05-01T12:30:00.000Z"}"#;
        let decoded = SidecarRecord::decode(json).unwrap();
        assert_eq!(decoded, record(None));
    }

    #[test]
    fn test_malformed_is_deserialization_error() {
        let err = SidecarRecord::decode(b"{\"identifier\":").unwrap_err();
        assert!(matches!(err, StoreError::Deserialization(_)));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(SidecarRecord::load(&dir.path().join("nope.meta")).unwrap().is_none());
    }
}
