//! Chunked blob storage facade and parameterized aggregation pipelines.
//!
//! This crate provides two independent components that share only a storage
//! handle:
//!
//! - [`BlobStore`] — stores, retrieves, deletes, and serves arbitrarily
//!   sized binary files over a chunked blob backend, preserving metadata
//!   (content type, filename, length) and exposing a streaming download
//!   surface with deterministic HTTP headers.
//! - [`PipelineEngine`] — loads JSON aggregation-pipeline templates,
//!   substitutes `##name##` / `##...##` placeholders, parses the result
//!   into pipeline stage documents, and executes them against a named
//!   collection.
//!
//! # Architecture
//!
//! Every consumed contract sits behind an object-safe trait: storage behind
//! [`BlobBackend`] (implemented here by [`ChunkedBlobStore`] over any
//! `object_store::ObjectStore`), aggregation behind [`AggregationBackend`]
//! (the database driver is the host's concern), and template resolution
//! behind [`TemplateLoader`]. The facades hold `Arc`'d backends and no
//! other state, so they are cheap to clone into handlers and safe to share
//! across tasks.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gridstore::{BlobStore, ChunkedBlobStore, UploadedFile};
//!
//! # async fn example() -> Result<(), gridstore::StoreError> {
//! let backend = Arc::new(ChunkedBlobStore::in_memory());
//! let store = BlobStore::new(backend);
//!
//! let upload = UploadedFile::new(
//!     Some("report.pdf".to_string()),
//!     Some("application/pdf".to_string()),
//!     bytes::Bytes::from_static(b"%PDF-1.4 ..."),
//! );
//! let id = store.store(upload).await?;
//!
//! // Streams the stored bytes with Content-Disposition / Content-Type /
//! // Content-Length / Cache-Control headers.
//! let response = store.download(&id).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gridstore::{FsTemplateLoader, PipelineArgs, PipelineEngine};
//!
//! # async fn example(backend: Arc<dyn gridstore::AggregationBackend>) {
//! let loader = Arc::new(FsTemplateLoader::new("./pipelines"));
//! let engine = PipelineEngine::new(backend, loader);
//!
//! let results = engine
//!     .execute_template(
//!         "orders",
//!         r###"[{"$match":{"status":"##s##"}}]"###,
//!         PipelineArgs::named([("s", "shipped".into())]),
//!     )
//!     .await;
//! # let _ = results;
//! # }
//! ```

mod chunked;
mod config;
mod error;
mod mime;
mod pipeline;
mod record;
mod store;
mod template;
mod traits;

pub use chunked::ChunkedBlobStore;
pub use config::{default_blob_store_path, BlobStorageConfig, DEFAULT_CHUNK_SIZE};
pub use error::{PipelineError, StoreError, StoreResult};
pub use mime::content_type_for_filename;
pub use pipeline::PipelineEngine;
pub use record::{content_type_metadata, BlobId, BlobRecord, Document, CONTENT_TYPE_KEY};
pub use store::{download_headers, BlobResource, BlobStore, UploadedFile};
pub use template::{substitute, FsTemplateLoader, PipelineArgs, StaticTemplateLoader};
pub use traits::{AggregationBackend, BlobBackend, ByteStream, TemplateLoader};
