//! Blob storage configuration.

use std::env;

use serde::{Deserialize, Serialize};

/// Default chunk size for stored blobs (255 KiB, the conventional chunk
/// size of document-database blob facilities).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Configuration for the chunked blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    /// Storage URL (e.g., `file:///path`, `s3://bucket/prefix`,
    /// `memory:///`).
    #[serde(default = "default_blob_store_path")]
    pub path: String,

    /// Maximum size of a single stored chunk, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        Self {
            path: default_blob_store_path(),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Default blob store path (local filesystem).
pub fn default_blob_store_path() -> String {
    format!(
        "file://{}",
        env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join("gridstore_storage/blobs")
            .to_str()
            .unwrap_or("./gridstore_storage/blobs")
    )
}
