//! Hard deadlines for individual network calls.

use crate::error::{AnalysisError, Result};
use std::future::Future;
use std::time::Duration;

/// Race `fut` against `deadline`.
///
/// Returns the future's own result if it finishes first, otherwise
/// [`AnalysisError::Timeout`]. On timeout the future is dropped, which
/// abandons any in-flight request it owns.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(?deadline, "call exceeded deadline");
            Err(AnalysisError::Timeout(deadline))
        }
    }
}

/// Per-category deadlines. Each network call uses exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Liveness probe. Default: 5 seconds.
    pub health: Duration,
    /// Defaults fetch and result polling. Default: 10 seconds.
    pub parameters: Duration,
    /// One analysis submission attempt. Default: 300 seconds.
    pub submit: Duration,
    /// Artifact download. Default: 30 seconds.
    pub download: Duration,
    /// Artifact deletion. Default: 10 seconds.
    pub delete: Duration,
    /// Geocoding lookups. Default: 10 seconds.
    pub geocode: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(5),
            parameters: Duration::from_secs(10),
            submit: Duration::from_secs(300),
            download: Duration::from_secs(30),
            delete: Duration::from_secs(10),
            geocode: Duration::from_secs(10),
        }
    }
}
