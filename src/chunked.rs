//! Chunked blob store over an `object_store` backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use object_store::{memory::InMemory, parse_url, path::Path, ObjectStore};
use url::Url;

use crate::config::BlobStorageConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::{epoch_ms, BlobId, BlobRecord, Document};
use crate::traits::{BlobBackend, ByteStream};

/// Blob backend that splits content into fixed-size chunk objects
/// addressed by a root record.
///
/// Each blob occupies the prefix `<base>/<id>/` with a `record.json`
/// object (the serialized [`BlobRecord`]) and `chunk.NNNNNN` objects of at
/// most `chunk_size` bytes. The record is written last, so a blob is only
/// discoverable once its content is complete.
#[derive(Debug)]
pub struct ChunkedBlobStore {
    object_store: Arc<dyn ObjectStore>,
    base: Path,
    chunk_size: usize,
}

impl ChunkedBlobStore {
    /// Create a store over an existing object store client.
    ///
    /// A zero `chunk_size` is floored to one byte so the chunking loop
    /// always makes progress.
    pub fn new(object_store: Arc<dyn ObjectStore>, base: Path, chunk_size: usize) -> Self {
        Self {
            object_store,
            base,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Create a store from configuration, parsing the storage URL.
    pub fn from_config(config: &BlobStorageConfig) -> anyhow::Result<Self> {
        if config.chunk_size_bytes == 0 {
            anyhow::bail!("chunk_size_bytes must be non-zero");
        }
        let url = config.path.parse::<Url>()?;
        let (object_store, base) = parse_url(&url)?;
        Ok(Self {
            object_store: Arc::from(object_store),
            base,
            chunk_size: config.chunk_size_bytes,
        })
    }

    /// In-memory store, for tests and embedded use.
    pub fn in_memory() -> Self {
        Self {
            object_store: Arc::new(InMemory::new()),
            base: Path::default(),
            chunk_size: crate::config::DEFAULT_CHUNK_SIZE,
        }
    }

    fn record_path(&self, id: &BlobId) -> Path {
        self.base.child(id.as_str()).child("record.json")
    }

    fn chunk_path(&self, id: &BlobId, n: u64) -> Path {
        self.base
            .child(id.as_str())
            .child(format!("chunk.{:06}", n))
    }
}

#[async_trait]
impl BlobBackend for ChunkedBlobStore {
    async fn store(
        &self,
        mut data: ByteStream,
        filename: &str,
        metadata: Option<Document>,
    ) -> StoreResult<BlobId> {
        let id = BlobId::generate();
        let mut pending = BytesMut::new();
        let mut length = 0u64;
        let mut chunk_count = 0u64;

        while let Some(chunk) = data.next().await {
            let chunk = chunk.map_err(|e| StoreError::Io {
                source: std::io::Error::other(e),
            })?;
            length += chunk.len() as u64;
            pending.extend_from_slice(&chunk);

            while pending.len() >= self.chunk_size {
                let piece = pending.split_to(self.chunk_size).freeze();
                self.object_store
                    .put(&self.chunk_path(&id, chunk_count), piece.into())
                    .await?;
                chunk_count += 1;
            }
        }
        if !pending.is_empty() {
            let piece = pending.freeze();
            self.object_store
                .put(&self.chunk_path(&id, chunk_count), piece.into())
                .await?;
            chunk_count += 1;
        }

        let record = BlobRecord {
            id: id.clone(),
            filename: filename.to_string(),
            length,
            chunk_size: self.chunk_size as u64,
            chunk_count,
            metadata,
            uploaded_at_ms: epoch_ms(),
        };
        let encoded = serde_json::to_vec(&record).map_err(|e| StoreError::Backend {
            source: anyhow::Error::from(e),
        })?;
        self.object_store
            .put(&self.record_path(&id), Bytes::from(encoded).into())
            .await?;

        Ok(id)
    }

    async fn find_one(&self, id: &BlobId) -> StoreResult<Option<BlobRecord>> {
        let result = match self.object_store.get(&self.record_path(id)).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = result.bytes().await?;
        let record = serde_json::from_slice(&raw).map_err(|e| StoreError::Backend {
            source: anyhow::anyhow!("corrupt blob record {}: {}", id, e),
        })?;
        Ok(Some(record))
    }

    async fn open(&self, record: &BlobRecord) -> StoreResult<ByteStream> {
        let store = self.object_store.clone();
        let base = self.base.clone();
        let id = record.id.clone();
        let chunk_count = record.chunk_count;

        let stream = async_stream::stream! {
            for n in 0..chunk_count {
                let path = base.child(id.as_str()).child(format!("chunk.{:06}", n));
                let chunk = match store.get(&path).await {
                    Ok(result) => result.bytes().await,
                    Err(e) => Err(e),
                };
                match chunk {
                    Ok(bytes) => yield Ok(bytes),
                    Err(e) => {
                        yield Err(anyhow::anyhow!(
                            "failed to read chunk {} of blob {}: {}", n, id, e
                        ));
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn delete(&self, record: &BlobRecord) -> StoreResult<()> {
        // Chunks first; a half-deleted blob stays discoverable through its
        // record until the final delete below.
        for n in 0..record.chunk_count {
            match self.object_store.delete(&self.chunk_path(&record.id, n)).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        match self.object_store.delete(&self.record_path(&record.id)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
