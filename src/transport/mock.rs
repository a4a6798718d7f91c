//! Mock transport for testing without a live analysis service.
//!
//! [`MockTransport`] answers each `(method, path)` route from a scripted list
//! of replies, letting downstream consumers write deterministic tests.
//!
//! # Example
//!
//! ```
//! use heat_analysis_client::transport::{Method, MockReply, MockTransport};
//! use serde_json::json;
//!
//! let mock = MockTransport::new()
//!     .route(Method::Get, "/health", vec![MockReply::json(200, json!({"status": "ok"}))]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::{AnalysisError, Result};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with this status and raw body.
    Respond { status: u16, body: Vec<u8> },
    /// Fail at the transport layer with this message.
    Fail(String),
    /// Never respond; only a deadline ends the call.
    Hang,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        MockReply::Respond {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    pub fn bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        MockReply::Respond {
            status,
            body: body.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

/// A test transport that answers routes with scripted replies in order.
///
/// The last reply of a route repeats once the others are used up. Unrouted
/// requests get `404 {"error": "Endpoint not found"}`. Every request is
/// recorded and can be inspected with [`requests`](Self::requests).
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the replies for one route (builder style).
    pub fn route(self, method: Method, path: impl Into<String>, replies: Vec<MockReply>) -> Self {
        lock(&self.routes).insert((method, path.into()), replies.into());
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of requests sent to `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.path() == path)
            .count()
    }

    fn next_reply(&self, request: &HttpRequest) -> Option<MockReply> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(&(request.method, request.path()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        lock(&self.requests).push(request.clone());

        match self.next_reply(request) {
            Some(MockReply::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(MockReply::Fail(message)) => Err(AnalysisError::Network(message)),
            Some(MockReply::Hang) => {
                futures::future::pending::<()>().await;
                Err(AnalysisError::Other("pending future resolved".into()))
            }
            None => Ok(HttpResponse::new(
                404,
                json!({"error": "Endpoint not found"}).to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
