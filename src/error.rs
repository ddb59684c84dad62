//! Error taxonomy for the ingest, index and query stages.
//!
//! Each component returns its own error enum. The pipeline facade is the only
//! place that folds them into a [`PipelineError`] tagged with the failing
//! [`Stage`].

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use reqwest::header::InvalidHeaderValue;
use reqwest::StatusCode;
use thiserror::Error;

/// Failures while turning the raw catalog into the cleaned document table.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Schema violation: required columns are absent from the catalog header.
    #[error("catalog is missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        /// Names of the absent columns, in declaration order.
        missing: Vec<String>,
    },
    /// The raw catalog could not be opened or its header row was unreadable.
    #[error("failed to read catalog {path:?}")]
    Read {
        /// Catalog path.
        path: PathBuf,
        /// Underlying CSV/IO error.
        #[source]
        source: csv::Error,
    },
    /// The cleaned table could not be written.
    #[error("failed to write cleaned table {path:?}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying CSV/IO error.
        #[source]
        source: csv::Error,
    },
}

/// Failures raised by embedding collaborators.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// No access token was configured for a remote embedding service.
    #[error("missing access token for the {0} embedding service")]
    MissingToken(&'static str),
    /// The access token cannot be used as an HTTP header value.
    #[error("invalid embedding access token")]
    InvalidToken(#[from] InvalidHeaderValue),
    /// Embedder settings were rejected before any request was made.
    #[error("invalid embedder configuration: {0}")]
    Config(String),
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("embedding request failed")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("embedding request failed ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },
    /// The response payload did not have the expected shape.
    #[error("unexpected embedding response: {0}")]
    Decode(String),
    /// The service returned a different number of vectors than inputs sent.
    #[error("embedding service returned {got} vectors for {expected} inputs")]
    CountMismatch {
        /// Number of inputs submitted.
        expected: usize,
        /// Number of vectors received.
        got: usize,
    },
}

/// Failures reading or writing the persisted vector index.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No complete index exists at the location.
    #[error("no vector index found at {0:?}")]
    Missing(PathBuf),
    /// Filesystem failure while reading or writing index files.
    #[error("vector index I/O failed at {path:?}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Index files exist but cannot be decoded or are inconsistent.
    #[error("corrupt vector index at {path:?}: {reason}")]
    Corrupt {
        /// File that failed validation.
        path: PathBuf,
        /// Human-readable description of the inconsistency.
        reason: String,
    },
    /// A vector does not match the dimension recorded for the index.
    #[error("embedding dimension mismatch: index stores {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension recorded in the index manifest.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// A record could not be serialized.
    #[error("failed to encode index record")]
    Encode(#[from] serde_json::Error),
}

/// Rejected text splitter settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitterError {
    /// `chunk_size` must be at least one character.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Failures while building the vector index from the cleaned table.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The cleaned table could not be read.
    #[error("failed to read cleaned table {path:?}")]
    Read {
        /// Cleaned table path.
        path: PathBuf,
        /// Underlying CSV/IO error.
        #[source]
        source: csv::Error,
    },
    /// The cleaned table lacks the `document` column.
    #[error("cleaned table {0:?} has no `document` column")]
    MissingDocumentColumn(PathBuf),
    /// Invalid chunking settings.
    #[error("invalid text splitter settings")]
    Splitter(#[from] SplitterError),
    /// The embedding collaborator failed.
    #[error("failed to embed chunks")]
    Embedding(#[from] EmbeddingError),
    /// The index could not be persisted.
    #[error("failed to persist vector index")]
    Store(#[from] StoreError),
}

/// Failures while retrieving chunks for a query.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query could not be embedded.
    #[error("failed to embed query")]
    Embedding(#[from] EmbeddingError),
    /// The similarity search failed.
    #[error("vector search failed")]
    Store(#[from] StoreError),
}

/// Failures raised by language-model collaborators.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API key was configured.
    #[error("missing API key for the {0} language model")]
    MissingApiKey(&'static str),
    /// The API key cannot be used as an HTTP header value.
    #[error("invalid language model API key")]
    InvalidApiKey(#[from] InvalidHeaderValue),
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("language model request failed")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status (auth, rate limit, ...).
    #[error("language model returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },
    /// The response body was not a valid completion payload.
    #[error("failed to parse language model response")]
    Decode(#[source] reqwest::Error),
    /// The completion carried no text.
    #[error("language model response contained no text")]
    EmptyResponse,
}

/// Failures raised by the recommendation engine.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Retrieval failed.
    #[error("retrieval failed")]
    Retrieval(#[from] RetrievalError),
    /// Generation failed.
    #[error("generation failed")]
    Generation(#[from] GenerationError),
}

/// Pipeline phase in which a [`PipelineError`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Opening the index and building collaborators.
    Initialization,
    /// Serving a single `recommend` call.
    Recommendation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization => write!(f, "pipeline initialization"),
            Self::Recommendation => write!(f, "recommendation"),
        }
    }
}

/// Boxed cause carried by [`PipelineError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Umbrella error surfaced by the pipeline facade.
#[derive(Debug, Error)]
#[error("error during {stage}")]
pub struct PipelineError {
    stage: Stage,
    #[source]
    source: BoxError,
}

impl PipelineError {
    /// Wraps `source` with the stage it failed in.
    pub fn new<E>(stage: Stage, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Stage in which the failure occurred.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Original cause, for downcasting.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_name() {
        let err = CatalogError::MissingColumns {
            missing: vec!["Genres".into(), "sypnopsis".into()],
        };
        assert_eq!(
            err.to_string(),
            "catalog is missing required columns: Genres, sypnopsis"
        );
    }

    #[test]
    fn pipeline_error_keeps_stage_and_cause() {
        let err = PipelineError::new(Stage::Recommendation, GenerationError::EmptyResponse);
        assert_eq!(err.stage(), Stage::Recommendation);
        assert_eq!(err.to_string(), "error during recommendation");
        let source = StdError::source(&err).expect("source");
        assert!(source.downcast_ref::<GenerationError>().is_some());
    }
}
