//! Blob store facade: ingestion, retrieval, deletion, and HTTP download.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Multipart,
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use bytes::Bytes;
use futures::stream;
use serde_json::Value;
use tracing::{error, info};

use crate::error::{StoreError, StoreResult};
use crate::mime::content_type_for_filename;
use crate::record::{content_type_metadata, BlobId, BlobRecord, CONTENT_TYPE_KEY};
use crate::traits::{BlobBackend, ByteStream};

/// A file-like upload: byte content plus the declared filename and content
/// type, as carried by a multipart request.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: Option<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            filename,
            content_type,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Extract the first file field of a multipart request.
    ///
    /// Fields without a filename are skipped. Yields *invalid-argument*
    /// when no file field is present and *io-error* when the request body
    /// cannot be read.
    pub async fn from_multipart(multipart: &mut Multipart) -> StoreResult<Self> {
        while let Some(field) = multipart.next_field().await.map_err(|e| StoreError::Io {
            source: std::io::Error::other(e),
        })? {
            if field.file_name().is_none() {
                continue;
            }
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|e| StoreError::Io {
                source: std::io::Error::other(e),
            })?;
            return Ok(Self {
                filename,
                content_type,
                data,
            });
        }
        Err(StoreError::InvalidArgument {
            reason: "multipart request carries no file field".to_string(),
        })
    }
}

/// A retrieved blob: its record plus a stream of the stored bytes.
pub struct BlobResource {
    pub record: BlobRecord,
    pub stream: ByteStream,
}

impl std::fmt::Debug for BlobResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobResource")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Facade over a chunked blob backend.
///
/// Stateless; every operation is a single call to the backend, so the
/// facade can be cloned freely and shared across tasks.
#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
}

impl BlobStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    /// Store a multipart upload, returning the new blob's printable id.
    ///
    /// The upload and its filename must be non-empty; the declared content
    /// type is recorded in the blob's metadata.
    pub async fn store(&self, file: UploadedFile) -> StoreResult<String> {
        if file.is_empty() {
            return Err(StoreError::InvalidArgument {
                reason: "file is empty".to_string(),
            });
        }
        let UploadedFile {
            filename,
            content_type,
            data,
        } = file;
        let filename = match filename.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(StoreError::InvalidArgument {
                    reason: "file name is empty".to_string(),
                })
            }
        };

        let data = stream::once(async move { Ok::<_, anyhow::Error>(data) });
        self.store_stream(Box::pin(data), &filename, content_type.as_deref())
            .await
    }

    /// Store an explicit byte stream. Callers are trusted to pass
    /// non-empty inputs; backend errors propagate.
    pub async fn store_stream(
        &self,
        data: ByteStream,
        filename: &str,
        content_type: Option<&str>,
    ) -> StoreResult<String> {
        let metadata = content_type_metadata(content_type);
        let id = self
            .backend
            .store(data, filename, Some(metadata))
            .await
            .map_err(|e| {
                error!("failed to store blob {}: {}", filename, e);
                e
            })?;
        info!("stored blob {} as {}", filename, id);
        Ok(id.to_string())
    }

    /// Decode a standard-base64 payload and store it, deriving the content
    /// type from the filename's extension.
    pub async fn store_base64(&self, base64_text: &str, filename: &str) -> StoreResult<String> {
        if base64_text.is_empty() {
            return Err(StoreError::InvalidArgument {
                reason: "base64 content is empty".to_string(),
            });
        }
        let data = BASE64_STANDARD.decode(base64_text).map_err(|e| {
            error!("failed to decode base64 payload for {}: {}", filename, e);
            StoreError::Decode { source: e }
        })?;
        let content_type = content_type_for_filename(filename);
        let stream = stream::once(async move { Ok::<_, anyhow::Error>(Bytes::from(data)) });
        self.store_stream(Box::pin(stream), filename, Some(content_type))
            .await
    }

    /// Look up a record by its printable id.
    ///
    /// *invalid-argument* for malformed ids, *not-found* when no record
    /// matches.
    pub async fn find_record(&self, id: &str) -> StoreResult<BlobRecord> {
        let id = BlobId::parse(id)?;
        match self.backend.find_one(&id).await? {
            Some(record) => Ok(record),
            None => {
                error!("blob not found: {}", id);
                Err(StoreError::NotFound { id: id.to_string() })
            }
        }
    }

    /// Retrieve a blob as a readable resource.
    pub async fn retrieve(&self, id: &str) -> StoreResult<BlobResource> {
        let record = self.find_record(id).await?;
        let stream = self.backend.open(&record).await?;
        Ok(BlobResource { record, stream })
    }

    /// Delete a blob and all of its chunks.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let record = self.find_record(id).await?;
        self.backend.delete(&record).await?;
        info!("deleted blob {}", record.id);
        Ok(())
    }

    /// Build a streaming HTTP 200 response serving the blob's bytes.
    ///
    /// Headers follow the download-header policy; the response writer owns
    /// the stream and releases the backend read once the body is drained
    /// or dropped.
    pub async fn download(&self, id: &str) -> StoreResult<Response<Body>> {
        let record = self.find_record(id).await?;
        let headers = download_headers(Some(&record));
        let stream = self.backend.open(&record).await.map_err(|e| {
            error!("failed to open blob {} for download: {}", record.id, e);
            e
        })?;

        let mut response = Response::new(Body::from_stream(stream));
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Deterministic download headers for a blob record.
///
/// The `Content-Type` fallback is asymmetric on purpose: a record without
/// any metadata serves `text/plain` with `Content-Length: 0`, while one
/// whose metadata merely lacks `contentType` serves
/// `application/octet-stream` with the real length. Existing consumers
/// depend on this shape, so it is kept as is.
pub fn download_headers(record: Option<&BlobRecord>) -> HeaderMap {
    const CACHE: &str = "no-cache, no-store, must-revalidate";
    let mut headers = HeaderMap::new();

    let Some(record) = record else {
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=unknown"),
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE));
        return headers;
    };

    let disposition = if record.filename.is_empty() {
        HeaderValue::from_static("attachment; filename=unknown")
    } else {
        HeaderValue::from_str(&format!("attachment; filename={}", record.filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=unknown"))
    };
    headers.insert(CONTENT_DISPOSITION, disposition);

    let Some(metadata) = record.metadata.as_ref() else {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE));
        return headers;
    };

    let content_type = match metadata.get(CONTENT_TYPE_KEY) {
        Some(Value::Null) | None => HeaderValue::from_static("application/octet-stream"),
        Some(Value::String(s)) => HeaderValue::from_str(s)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        Some(other) => HeaderValue::from_str(&other.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    };
    headers.insert(CONTENT_TYPE, content_type);

    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&record.length.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE));
    headers
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::chunked::ChunkedBlobStore;
    use crate::record::Document;

    fn store() -> BlobStore {
        BlobStore::new(Arc::new(ChunkedBlobStore::in_memory()))
    }

    fn upload(filename: &str, content_type: &str, data: &'static [u8]) -> UploadedFile {
        UploadedFile::new(
            Some(filename.to_string()),
            Some(content_type.to_string()),
            Bytes::from_static(data),
        )
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn store_then_download_hello_world() {
        let store = store();
        let id = store
            .store(upload("hello.txt", "text/plain", b"Hello World !"))
            .await
            .unwrap();
        assert_eq!(id.len(), 24);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));

        let response = store.download(&id).await.unwrap();
        assert_eq!(response.status(), 200);
        let headers = response.headers();
        assert_eq!(
            headers.get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=hello.txt"
        );
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "13");
        assert_eq!(
            headers.get(CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Hello World !");
    }

    #[tokio::test]
    async fn store_rejects_empty_file_and_missing_filename() {
        let store = store();

        let err = store
            .store(upload("hello.txt", "text/plain", b""))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));

        let err = store
            .store(UploadedFile::new(None, None, Bytes::from_static(b"x")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));

        let err = store
            .store(UploadedFile::new(
                Some(String::new()),
                None,
                Bytes::from_static(b"x"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn store_stream_round_trip_preserves_bytes_and_metadata() {
        let store = store();
        let data = stream::once(async { Ok::<_, anyhow::Error>(Bytes::from_static(b"stream me")) });
        let id = store
            .store_stream(Box::pin(data), "notes.md", Some("text/markdown"))
            .await
            .unwrap();

        let resource = store.retrieve(&id).await.unwrap();
        assert_eq!(resource.record.length, 9);
        assert_eq!(resource.record.content_type(), Some("text/markdown"));
        assert_eq!(collect(resource.stream).await, b"stream me");
    }

    #[tokio::test]
    async fn store_base64_decodes_and_derives_content_type() {
        let store = store();
        // "SGVsbG8gV29ybGQh" is "Hello World!" (12 bytes).
        let id = store
            .store_base64("SGVsbG8gV29ybGQh", "hello.txt")
            .await
            .unwrap();

        let resource = store.retrieve(&id).await.unwrap();
        assert_eq!(resource.record.content_type(), Some("text/plain"));
        assert_eq!(resource.record.length, 12);
        assert_eq!(collect(resource.stream).await, b"Hello World!");
    }

    #[tokio::test]
    async fn store_base64_falls_back_for_unknown_extension() {
        let store = store();
        let id = store.store_base64("AAECAw==", "payload.dat").await.unwrap();
        let record = store.find_record(&id).await.unwrap();
        assert_eq!(record.content_type(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn store_base64_rejects_empty_and_invalid_input() {
        let store = store();

        let err = store.store_base64("", "x.txt").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));

        let err = store
            .store_base64("not base64 at all!!!", "x.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found_everywhere() {
        let store = store();
        let unknown = "000000000000000000000000";

        assert!(matches!(
            store.retrieve(unknown).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            store.delete(unknown).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            store.download(unknown).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn blob_resource_debug_elides_the_stream() {
        let store = store();
        let id = store
            .store(upload("dbg.txt", "text/plain", b"dbg"))
            .await
            .unwrap();
        let resource = store.retrieve(&id).await.unwrap();

        let rendered = format!("{:?}", resource);
        assert!(rendered.contains("BlobResource"));
        assert!(rendered.contains("dbg.txt"));
        assert!(!rendered.contains("stream"));
    }

    #[tokio::test]
    async fn malformed_handle_is_invalid_argument() {
        let store = store();
        assert!(matches!(
            store.retrieve("not-a-blob-id").await.unwrap_err(),
            StoreError::InvalidArgument { .. }
        ));
    }

    #[tokio::test]
    async fn delete_is_terminal() {
        let store = store();
        let id = store
            .store(upload("gone.txt", "text/plain", b"bye"))
            .await
            .unwrap();

        store.delete(&id).await.unwrap();

        assert!(matches!(
            store.retrieve(&id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            store.download(&id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            store.delete(&id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn from_multipart_takes_the_first_file_field() {
        use axum::extract::FromRequest;
        use axum::http::Request;

        let body = concat!(
            "--BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"note\"\r\n\r\n",
            "just a text field\r\n",
            "--BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"hello.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "Hello World !\r\n",
            "--BOUNDARY--\r\n",
        );
        let request = Request::builder()
            .header(CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();

        let file = UploadedFile::from_multipart(&mut multipart).await.unwrap();
        assert_eq!(file.filename.as_deref(), Some("hello.txt"));
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&file.data[..], b"Hello World !");
    }

    #[tokio::test]
    async fn from_multipart_without_file_field_is_invalid_argument() {
        use axum::extract::FromRequest;
        use axum::http::Request;

        let body = concat!(
            "--BOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"note\"\r\n\r\n",
            "no file here\r\n",
            "--BOUNDARY--\r\n",
        );
        let request = Request::builder()
            .header(CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap();
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();

        let err = UploadedFile::from_multipart(&mut multipart)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));
    }

    fn record(filename: &str, length: u64, metadata: Option<Document>) -> BlobRecord {
        BlobRecord {
            id: BlobId::generate(),
            filename: filename.to_string(),
            length,
            chunk_size: 255 * 1024,
            chunk_count: 1,
            metadata,
            uploaded_at_ms: 0,
        }
    }

    #[test]
    fn headers_for_absent_record() {
        let headers = download_headers(None);
        assert_eq!(
            headers.get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=unknown"
        );
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "0");
        assert_eq!(
            headers.get(CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
    }

    #[test]
    fn headers_for_record_without_metadata() {
        let headers = download_headers(Some(&record("a.bin", 42, None)));
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        // Length comes from metadata-bearing records only.
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "0");
    }

    #[test]
    fn headers_for_metadata_without_content_type() {
        let headers = download_headers(Some(&record("a.bin", 42, Some(Document::new()))));
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "42");
    }

    #[test]
    fn headers_for_null_content_type_fall_back() {
        let headers = download_headers(Some(&record(
            "a.bin",
            7,
            Some(content_type_metadata(None)),
        )));
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "7");
    }

    #[test]
    fn headers_for_empty_filename() {
        let headers = download_headers(Some(&record(
            "",
            3,
            Some(content_type_metadata(Some("text/plain"))),
        )));
        assert_eq!(
            headers.get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=unknown"
        );
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get(CONTENT_LENGTH).unwrap(), "3");
    }
}
