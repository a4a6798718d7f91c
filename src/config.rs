//! Client configuration.
//!
//! [`ClientConfig`] is built once and shared read-only by every call the
//! client makes.

use crate::error::{AnalysisError, Result};
use crate::timeout::Timeouts;
use crate::transport::RetryPolicy;
use std::time::Duration;

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Environment variable read by [`ClientConfig::from_env`].
pub const BASE_URL_ENV: &str = "HEAT_ANALYSIS_API_URL";

/// Default public geocoding endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// Settings for talking to the analysis service.
///
/// # Example
///
/// ```
/// use heat_analysis_client::config::ClientConfig;
/// use heat_analysis_client::transport::RetryPolicy;
///
/// let config = ClientConfig::builder("http://analysis.internal:5000/api/")
///     .retry(RetryPolicy::standard().with_max_attempts(5))
///     .build();
/// assert_eq!(config.base_url, "http://analysis.internal:5000/api");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Service root, without a trailing slash.
    pub base_url: String,
    /// Per-call deadlines.
    pub timeouts: Timeouts,
    /// Retry policy for analysis submission. Other calls are not retried.
    pub retry: RetryPolicy,
    /// `User-Agent` sent with every request, including geocoding.
    pub user_agent: String,
    /// Root of the geocoding service.
    pub geocoder_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder(DEFAULT_BASE_URL).build()
    }
}

impl ClientConfig {
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url: base_url.into(),
            timeouts: None,
            retry: None,
            user_agent: None,
            geocoder_url: None,
        }
    }

    /// Read the base URL from `HEAT_ANALYSIS_API_URL`, falling back to
    /// [`DEFAULT_BASE_URL`] when unset or blank.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(BASE_URL_ENV).ok())
    }

    fn from_env_value(value: Option<String>) -> Self {
        let base_url = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::builder(base_url).build()
    }

    /// Check the settings for values no client could run with.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(AnalysisError::InvalidConfig("base URL is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AnalysisError::InvalidConfig(
                "retry policy needs at least one attempt".into(),
            ));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "backoff multiplier must be at least 1.0, got {}",
                self.retry.multiplier
            )));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    base_url: String,
    timeouts: Option<Timeouts>,
    retry: Option<RetryPolicy>,
    user_agent: Option<String>,
    geocoder_url: Option<String>,
}

impl ClientConfigBuilder {
    /// Replace all deadlines at once.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Deadline of one submission attempt. Default: 300 seconds.
    pub fn submit_timeout(mut self, deadline: Duration) -> Self {
        self.timeouts.get_or_insert_with(Timeouts::default).submit = deadline;
        self
    }

    /// Submission retry policy. Default: [`RetryPolicy::standard()`].
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Geocoding service root. Default: [`DEFAULT_GEOCODER_URL`].
    pub fn geocoder_url(mut self, url: impl Into<String>) -> Self {
        self.geocoder_url = Some(url.into());
        self
    }

    pub fn build(self) -> ClientConfig {
        ClientConfig {
            base_url: normalize_base_url(&self.base_url),
            timeouts: self.timeouts.unwrap_or_default(),
            retry: self.retry.unwrap_or_else(RetryPolicy::standard),
            user_agent: self.user_agent.unwrap_or_else(|| {
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
            }),
            geocoder_url: normalize_base_url(
                self.geocoder_url.as_deref().unwrap_or(DEFAULT_GEOCODER_URL),
            ),
        }
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
