//! Blob identifiers and stored record structures.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A pipeline stage or metadata document.
pub type Document = serde_json::Map<String, Value>;

/// Metadata key holding the blob's MIME type.
pub const CONTENT_TYPE_KEY: &str = "contentType";

/// Printable identifier of a stored blob.
///
/// Ids are 24 hexadecimal characters (12 random bytes). The string form is
/// stable for the blob's lifetime and is the only token needed for
/// retrieve, delete, and download.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// Mint a fresh id.
    pub fn generate() -> Self {
        let raw: [u8; 12] = rand::random();
        Self(hex::encode(raw))
    }

    /// Validate the printable form of an id.
    ///
    /// Returns `StoreError::InvalidArgument` for anything that is not 24
    /// hexadecimal characters; malformed ids are rejected before touching
    /// storage.
    pub fn parse(s: &str) -> StoreResult<Self> {
        if s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(StoreError::InvalidArgument {
                reason: format!("invalid blob id: {}", s),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The backend's stored representation of a blob.
///
/// Created by any `store*` operation, never mutated afterwards, destroyed
/// only by an explicit delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRecord {
    pub id: BlobId,

    /// Original filename; may be empty.
    pub filename: String,

    /// Total byte length of the content.
    pub length: u64,

    /// Maximum chunk size the content was split into.
    pub chunk_size: u64,

    /// Number of stored chunks.
    pub chunk_count: u64,

    /// Open metadata mapping. `contentType` is the only key this crate
    /// consults; additional keys are preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Document>,

    /// Upload time, epoch milliseconds.
    pub uploaded_at_ms: u64,
}

impl BlobRecord {
    /// The metadata `contentType` value, if present and a string.
    pub fn content_type(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(CONTENT_TYPE_KEY))
            .and_then(Value::as_str)
    }
}

/// Build the metadata document written by `store*` operations.
///
/// The `contentType` key is always present; a missing declared type is
/// recorded as JSON null, which download header construction treats the
/// same as an absent key.
pub fn content_type_metadata(content_type: Option<&str>) -> Document {
    let mut metadata = Document::new();
    metadata.insert(
        CONTENT_TYPE_KEY.to_string(),
        match content_type {
            Some(ct) => Value::String(ct.to_string()),
            None => Value::Null,
        },
    );
    metadata
}

pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
