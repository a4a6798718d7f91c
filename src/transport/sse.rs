//! SSE (Server-Sent Events) decoding and the HTTP [`EventSource`].
//!
//! The decoder assembles `data:` lines into events across TCP chunk
//! boundaries, ignores `event:`/`id:`/`retry:` fields and `:` comments, and
//! yields each event's data payload as a string.

use super::http::{endpoint_url, parse_base_url};
use super::HttpResponse;
use crate::error::{AnalysisError, Result};
use crate::stream::{EventSource, FrameStream};
use crate::types::SessionHandle;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Url};
use std::collections::VecDeque;

/// SSE stream decoder.
///
/// # Example
///
/// ```
/// use heat_analysis_client::transport::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// let events = decoder.decode(b"data: {\"log\":\"Starting analysis...\"}\n\n");
/// assert_eq!(events, vec!["{\"log\":\"Starting analysis...\"}".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the data of every event completed by them.
    ///
    /// Bytes are buffered until a full line is available, so multi-byte
    /// characters split across chunks decode correctly.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing unterminated line and any pending event.
    pub fn flush(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

/// [`EventSource`] that reads `GET {base}/logs/{sessionId}` as an SSE stream.
#[derive(Debug, Clone)]
pub struct SseEventSource {
    client: Client,
    base_url: Url,
}

impl SseEventSource {
    /// `client` must not carry a request timeout; the stream stays open until
    /// a terminal event or a drop.
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }
}

struct Frames<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

#[async_trait]
impl EventSource for SseEventSource {
    async fn open(&self, session: &SessionHandle) -> Result<FrameStream> {
        let url = endpoint_url(&self.base_url, ["logs", session.as_str()])?;
        let resp = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| AnalysisError::Network(format!("Failed to connect to {}: {}", url, e)))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            return Err(HttpResponse::new(status, body).to_server_error());
        }
        tracing::debug!(%url, "log stream opened");

        let state = Frames {
            body: resp.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
            done: false,
        };

        let frames = futures::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(frame) = st.ready.pop_front() {
                    return Some((Ok(frame), st));
                }
                if st.done {
                    return None;
                }
                match st.body.next().await {
                    Some(Ok(chunk)) => st.ready.extend(st.decoder.decode(&chunk)),
                    Some(Err(e)) => {
                        st.done = true;
                        return Some((Err(AnalysisError::Request(e)), st));
                    }
                    None => {
                        st.done = true;
                        st.ready.extend(st.decoder.flush());
                    }
                }
            }
        });

        Ok(frames.boxed())
    }

    fn name(&self) -> &'static str {
        "sse"
    }
}
