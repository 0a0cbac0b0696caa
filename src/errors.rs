//! Structured error types for the path graph engine
//!
//! Every failure class a caller can observe has its own variant and a
//! machine-readable code. Degradable failures (embedding provider down,
//! classifier timeout) are represented here but normally logged and
//! absorbed rather than propagated.

use std::fmt;

/// Engine error taxonomy
#[derive(Debug)]
pub enum EngineError {
    /// Graph database unreachable — fatal for the request, not retried.
    StoreUnavailable(String),

    /// A graph query failed after the connection was established.
    StoreQuery(String),

    /// Embedding provider missing or failing — degrades matching quality.
    EmbeddingUnavailable(String),

    /// Intent classifier missing, timed out, or returned garbage.
    ClassifierUnavailable(String),

    /// Malformed ingestion payload — fatal for that request only.
    InvalidSubmission { field: String, reason: String },

    /// Generic wrapper for external errors.
    Internal(anyhow::Error),
}

impl EngineError {
    /// Machine-readable code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::StoreQuery(_) => "STORE_QUERY_FAILED",
            Self::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            Self::ClassifierUnavailable(_) => "CLASSIFIER_UNAVAILABLE",
            Self::InvalidSubmission { .. } => "INVALID_SUBMISSION",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        match self {
            Self::StoreUnavailable(msg) => format!("Graph store unavailable: {msg}"),
            Self::StoreQuery(msg) => format!("Graph query failed: {msg}"),
            Self::EmbeddingUnavailable(msg) => format!("Embedding provider unavailable: {msg}"),
            Self::ClassifierUnavailable(msg) => format!("Intent classifier unavailable: {msg}"),
            Self::InvalidSubmission { field, reason } => {
                format!("Invalid submission field '{field}': {reason}")
            }
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Whether the engine can keep serving in a degraded mode after this error.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_) | Self::ClassifierUnavailable(_)
        )
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EngineError {}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<neo4rs::Error> for EngineError {
    fn from(err: neo4rs::Error) -> Self {
        match err {
            neo4rs::Error::ConnectionError => {
                Self::StoreUnavailable("bolt connection failed".to_string())
            }
            other => Self::StoreQuery(other.to_string()),
        }
    }
}

/// Type alias for Results using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
