//! Consumed contracts: blob backend, aggregation backend, template loader.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::StoreResult;
use crate::record::{BlobId, BlobRecord, Document};

/// Streaming byte payload, as produced and consumed by blob backends.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Chunked blob storage backend.
///
/// Implemented in this crate by [`ChunkedBlobStore`](crate::ChunkedBlobStore)
/// over any `object_store::ObjectStore`; hosts may supply their own.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Write a blob from a byte stream, returning its new id.
    ///
    /// The record only becomes visible to `find_one` once the content is
    /// fully written.
    async fn store(
        &self,
        data: ByteStream,
        filename: &str,
        metadata: Option<Document>,
    ) -> StoreResult<BlobId>;

    /// Look up a record by id. `Ok(None)` when no record matches.
    async fn find_one(&self, id: &BlobId) -> StoreResult<Option<BlobRecord>>;

    /// Open the record's content as an ordered byte stream.
    async fn open(&self, record: &BlobRecord) -> StoreResult<ByteStream>;

    /// Remove the record and all of its chunks.
    async fn delete(&self, record: &BlobRecord) -> StoreResult<()>;
}

/// Aggregation surface of the database driver.
///
/// The driver itself is the host's concern; the engine only needs this
/// one operation.
#[async_trait]
pub trait AggregationBackend: Send + Sync {
    /// Run `pipeline` against `collection`, materializing the result
    /// documents in backend order. `allow_disk_use` permits spilling to
    /// disk for large sorts and groups.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
        allow_disk_use: bool,
    ) -> Result<Vec<Document>>;
}

/// Resolves logical template names to their contents.
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    /// Load a named template. `Ok(None)` indicates absence; `Err` is a
    /// read failure.
    async fn load(&self, name: &str) -> Result<Option<Bytes>>;
}
