//! Transport trait, normalized request/response types, and the retrying
//! request executor.
//!
//! ```text
//! AnalysisClient ──► HttpRequest ──► with_backoff() ──► Transport::send() ──► HttpResponse
//!                                         │                    │
//!                                  RetryPolicy /        ┌──────┴──────┐
//!                                  SubmitState     ReqwestTransport  MockTransport
//! ```
//!
//! The progress stream does not go through [`Transport`]; see
//! [`EventSource`](crate::stream::EventSource) and [`sse`].

pub mod backoff;
pub mod http;
pub mod mock;
pub mod sse;

pub use backoff::{JitterStrategy, RetryPolicy, SubmitState};
pub use http::ReqwestTransport;
pub use mock::{MockReply, MockTransport};
pub use sse::{SseDecoder, SseEventSource};

use crate::error::{AnalysisError, Result};
use crate::timeout::with_deadline;
use async_trait::async_trait;
use backoff::{AttemptOutcome, SubmitEvent};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Type alias for the callback invoked before each backoff sleep.
///
/// Arguments: `(next_attempt, delay_before_it, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &str) + Send)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A request against the analysis service, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Unescaped path segments; the transport escapes each one.
    pub segments: Vec<String>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body: None,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Get, segments)
    }

    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::Delete, segments)
    }

    pub fn post_json<I, S>(segments: I, body: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            body: Some(body),
            ..Self::new(Method::Post, segments)
        }
    }

    /// Path relative to the base URL, e.g. `/download-map/a.html`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The `error` field of a JSON body, if there is one.
    pub fn error_message(&self) -> Option<String> {
        serde_json::from_slice::<Value>(&self.body)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_string)
    }

    /// Build an [`AnalysisError::Server`] from this response.
    ///
    /// Uses the body's `error` message, falling back to `HTTP <status>`.
    pub fn to_server_error(&self) -> AnalysisError {
        let message = self
            .error_message()
            .unwrap_or_else(|| format!("HTTP {}", self.status));
        AnalysisError::Server {
            status: self.status,
            message,
        }
    }
}

/// Abstraction over the HTTP layer.
///
/// A transport performs exactly one attempt per call and never retries on its
/// own. It returns `Ok` for any response, whatever the status, and `Err` only
/// when no response was received.
///
/// Built-in implementations: [`ReqwestTransport`], [`MockTransport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Perform one logical request with per-attempt deadlines and retries.
///
/// Walks [`SubmitState`] under `policy`:
/// - a 2xx response returns immediately,
/// - a retryable status or transport failure waits the backoff delay and retries
///   while attempts remain,
/// - any other status fails at once with [`AnalysisError::Server`],
/// - when attempts run out, the last attempt's error is returned.
pub async fn with_backoff(
    transport: &dyn Transport,
    request: &HttpRequest,
    policy: &RetryPolicy,
    deadline: Duration,
    mut on_retry: RetryCallback<'_>,
) -> Result<HttpResponse> {
    let path = request.path();
    let mut state = SubmitState::Pending.transition(SubmitEvent::Begin, policy);
    let mut last: Option<Result<HttpResponse>> = None;

    loop {
        match state {
            SubmitState::Attempting(attempt) => {
                tracing::debug!(
                    transport = transport.name(),
                    %path,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "sending request"
                );
                let (outcome, result) =
                    match with_deadline(deadline, transport.send(request)).await {
                        Ok(resp) if resp.is_success() => (AttemptOutcome::Success, Ok(resp)),
                        Ok(resp) if policy.is_retryable_status(resp.status) => (
                            AttemptOutcome::RetryableStatus(resp.status),
                            Err(resp.to_server_error()),
                        ),
                        Ok(resp) => (
                            AttemptOutcome::FatalStatus(resp.status),
                            Err(resp.to_server_error()),
                        ),
                        Err(e) => (AttemptOutcome::TransportError, Err(e)),
                    };
                last = Some(result);
                state = state.transition(SubmitEvent::Completed(outcome), policy);
            }
            SubmitState::Retrying {
                next_attempt,
                delay,
            } => {
                let reason = match &last {
                    Some(Err(e)) => e.to_string(),
                    _ => String::new(),
                };
                tracing::warn!(
                    %path,
                    attempt = next_attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    %reason,
                    "retrying request"
                );
                if let Some(ref mut cb) = on_retry {
                    cb(next_attempt, delay, &reason);
                }
                tokio::time::sleep(delay).await;
                state = state.transition(SubmitEvent::BackoffElapsed, policy);
            }
            SubmitState::Pending => {
                state = state.transition(SubmitEvent::Begin, policy);
            }
            SubmitState::Succeeded | SubmitState::Failed | SubmitState::Exhausted => {
                if state == SubmitState::Exhausted {
                    tracing::warn!(%path, attempts = policy.max_attempts, "retries exhausted");
                }
                return last.unwrap_or_else(|| {
                    Err(AnalysisError::Other(
                        "retry loop ended without an attempt".into(),
                    ))
                });
            }
        }
    }
}
