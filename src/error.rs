use std::time::Duration;
use thiserror::Error;

/// Errors produced while driving an analysis job.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Caller input rejected before any network activity.
    #[error("{0}")]
    Validation(String),

    /// Low-level HTTP transport failure (connection refused, reset, DNS).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Transport failure described by a message, including an unreachable service.
    #[error("{0}")]
    Network(String),

    /// A single network call exceeded its deadline.
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// Non-retryable HTTP failure, or retryable statuses until attempts ran out.
    #[error("HTTP {status}: {message}")]
    Server {
        /// HTTP status code of the last response.
        status: u16,
        /// Server-provided `error` message, or `HTTP <status>` when absent.
        message: String,
    },

    /// The progress channel dropped before a terminal event.
    #[error("{0}")]
    Stream(String),

    /// The server reported that the analysis itself failed.
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local file I/O (artifact download, history file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`AnalysisError`].
///
/// Callers usually only need to know which of these five buckets a failure
/// falls into: whether to fix the input, retry later, or report the server's
/// reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Network,
    Server,
    Stream,
    AnalysisFailed,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Validation(_) | AnalysisError::InvalidConfig(_) => ErrorKind::Validation,
            AnalysisError::Request(_)
            | AnalysisError::Network(_)
            | AnalysisError::Timeout(_)
            | AnalysisError::Io(_)
            | AnalysisError::Other(_) => ErrorKind::Network,
            AnalysisError::Server { .. } | AnalysisError::Json(_) => ErrorKind::Server,
            AnalysisError::Stream(_) => ErrorKind::Stream,
            AnalysisError::AnalysisFailed(_) => ErrorKind::AnalysisFailed,
        }
    }

    /// Whether the failure happened at the transport layer (no response seen).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AnalysisError::Request(_) | AnalysisError::Network(_) | AnalysisError::Timeout(_)
        )
    }
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        AnalysisError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
