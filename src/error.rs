//! Error types for the blob store and the pipeline engine.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Result type for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by [`BlobStore`](crate::BlobStore) and its backend.
#[derive(Debug)]
pub enum StoreError {
    /// Caller passed an empty upload, filename, base64 payload, or a
    /// malformed blob id.
    InvalidArgument { reason: String },

    /// Base64 input did not decode.
    Decode { source: base64::DecodeError },

    /// No record matches the given id.
    NotFound { id: String },

    /// A stream could not be opened or read.
    Io { source: std::io::Error },

    /// Any other failure reported by the storage backend.
    Backend { source: anyhow::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidArgument { reason } => {
                write!(f, "invalid argument: {}", reason)
            }
            StoreError::Decode { source } => write!(f, "invalid base64 payload: {}", source),
            StoreError::NotFound { id } => write!(f, "blob not found: {}", id),
            StoreError::Io { source } => write!(f, "I/O error: {}", source),
            StoreError::Backend { source } => write!(f, "backend error: {}", source),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Decode { source } => Some(source),
            StoreError::Io { source } => Some(source),
            StoreError::Backend { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io { source: err }
    }
}

impl From<base64::DecodeError> for StoreError {
    fn from(err: base64::DecodeError) -> Self {
        StoreError::Decode { source: err }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Backend { source: err }
    }
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        StoreError::Backend {
            source: anyhow::Error::from(err),
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::InvalidArgument { .. } | StoreError::Decode { .. } => {
                StatusCode::BAD_REQUEST
            }
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Io { .. } | StoreError::Backend { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error!("blob store error: {} - {}", status, self);
        (status, self.to_string()).into_response()
    }
}

/// Errors surfaced by the `try_*` API of
/// [`PipelineEngine`](crate::PipelineEngine). The compatible `execute*`
/// API absorbs these, logging them and returning empty results.
#[derive(Debug)]
pub enum PipelineError {
    /// Template resource missing from the loader.
    TemplateNotFound { name: String },

    /// Template resource could not be read.
    Template { reason: String },

    /// Substituted template did not parse as a JSON array of stage
    /// documents.
    Parse { source: serde_json::Error },

    /// Failure reported by the aggregation backend.
    Backend { source: anyhow::Error },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::TemplateNotFound { name } => {
                write!(f, "pipeline template not found: {}", name)
            }
            PipelineError::Template { reason } => {
                write!(f, "pipeline template error: {}", reason)
            }
            PipelineError::Parse { source } => {
                write!(f, "pipeline did not parse as a JSON stage array: {}", source)
            }
            PipelineError::Backend { source } => write!(f, "aggregation error: {}", source),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Parse { source } => Some(source),
            PipelineError::Backend { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse { source: err }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Backend { source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_id() {
        let err = StoreError::NotFound {
            id: "000000000000000000000000".to_string(),
        };
        assert_eq!(err.to_string(), "blob not found: 000000000000000000000000");
    }

    #[test]
    fn status_mapping() {
        use axum::response::IntoResponse;

        let resp = StoreError::NotFound { id: "x".into() }.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = StoreError::InvalidArgument {
            reason: "file is empty".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = StoreError::Backend {
            source: anyhow::anyhow!("boom"),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
