//! Progress streaming for one analysis session.
//!
//! [`SessionStreamClient::open`] attaches a [`StreamObserver`] to a session's
//! event source and returns a [`StreamHandle`]. The observer sees zero or
//! more `on_log` calls followed by exactly one `on_complete` or `on_fail`,
//! unless the handle is cancelled first, in which case it sees nothing more.
//!
//! Frames are read by one spawned task. Each frame is applied to the
//! [`StreamState`] machine and its callback run while holding the session
//! lock; [`StreamHandle::cancel`] takes the same lock, so once it returns no
//! callback can follow.

pub mod source;
pub mod state;

pub use source::{EventSource, FrameSender, FrameStream, MockEventSource};
pub use state::{Effect, Resolution, StreamEvent, StreamInput, StreamState};

use crate::error::AnalysisError;
use crate::types::{AnalysisResult, LogEvent, SessionHandle};
use futures::StreamExt;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Receives the callbacks of one session.
///
/// Callbacks run on the stream's reader task while the session lock is
/// held. They must not call [`StreamHandle::cancel`] on their own session.
pub trait StreamObserver: Send {
    fn on_log(&mut self, event: LogEvent);
    fn on_complete(&mut self, result: AnalysisResult);
    fn on_fail(&mut self, error: AnalysisError);
}

/// A [`StreamObserver`] built from three closures.
///
/// # Example
///
/// ```
/// use heat_analysis_client::stream::FnObserver;
/// use heat_analysis_client::{AnalysisError, AnalysisResult, LogEvent};
///
/// let observer = FnObserver::new(
///     |log: LogEvent| println!("{}", log.message),
///     |result: AnalysisResult| println!("{} hotspots", result.hotspots_found),
///     |error: AnalysisError| eprintln!("{}", error),
/// );
/// ```
pub struct FnObserver<L, C, F> {
    on_log: L,
    on_complete: C,
    on_fail: F,
}

impl<L, C, F> FnObserver<L, C, F>
where
    L: FnMut(LogEvent) + Send,
    C: FnMut(AnalysisResult) + Send,
    F: FnMut(AnalysisError) + Send,
{
    pub fn new(on_log: L, on_complete: C, on_fail: F) -> Self {
        Self {
            on_log,
            on_complete,
            on_fail,
        }
    }
}

impl<L, C, F> StreamObserver for FnObserver<L, C, F>
where
    L: FnMut(LogEvent) + Send,
    C: FnMut(AnalysisResult) + Send,
    F: FnMut(AnalysisError) + Send,
{
    fn on_log(&mut self, event: LogEvent) {
        (self.on_log)(event)
    }

    fn on_complete(&mut self, result: AnalysisResult) {
        (self.on_complete)(result)
    }

    fn on_fail(&mut self, error: AnalysisError) {
        (self.on_fail)(error)
    }
}

/// Callback forwarded over a channel; see the [`StreamObserver`] impl on
/// `mpsc::UnboundedSender<StreamMessage>`.
#[derive(Debug)]
pub enum StreamMessage {
    Log(LogEvent),
    Completed(AnalysisResult),
    Failed(AnalysisError),
}

impl StreamObserver for mpsc::UnboundedSender<StreamMessage> {
    fn on_log(&mut self, event: LogEvent) {
        let _ = self.send(StreamMessage::Log(event));
    }

    fn on_complete(&mut self, result: AnalysisResult) {
        let _ = self.send(StreamMessage::Completed(result));
    }

    fn on_fail(&mut self, error: AnalysisError) {
        let _ = self.send(StreamMessage::Failed(error));
    }
}

/// Parse one text frame.
///
/// Returns `None` for frames that are not one of the recognized shapes;
/// those are logged and otherwise ignored.
pub fn parse_frame(data: &str) -> Option<StreamEvent> {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, frame = %data, "ignoring malformed frame");
            return None;
        }
    };

    if let Some(line) = value
        .get("log")
        .and_then(Value::as_str)
        .filter(|line| !line.is_empty())
    {
        return Some(StreamEvent::Log(line.to_string()));
    }

    match value.get("status").and_then(Value::as_str) {
        Some("completed") => {
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<AnalysisResult>(result) {
                Ok(result) => Some(StreamEvent::Completed(result)),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring completion frame with unreadable result");
                    None
                }
            }
        }
        Some("failed") => {
            let reason = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Analysis failed");
            Some(StreamEvent::Failed(reason.to_string()))
        }
        Some(other) => {
            tracing::debug!(status = other, "ignoring non-terminal status frame");
            None
        }
        // The server reports unknown sessions as a bare `{"error": ...}` frame.
        None => match value.get("error").and_then(Value::as_str) {
            Some(reason) => Some(StreamEvent::Failed(reason.to_string())),
            None => {
                tracing::warn!(frame = %data, "ignoring frame of unknown shape");
                None
            }
        },
    }
}

struct Session {
    state: StreamState,
    observer: Box<dyn StreamObserver>,
}

fn lock_session(shared: &Mutex<Session>) -> MutexGuard<'_, Session> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Apply one input and run its callback under the session lock.
/// Returns whether the session is resolved afterwards.
fn apply(shared: &Mutex<Session>, input: StreamInput) -> bool {
    let mut session = lock_session(shared);
    let (next, effect) = session.state.transition(input);
    if next != session.state {
        tracing::debug!(from = ?session.state, to = ?next, "stream state changed");
    }
    session.state = next;

    match effect {
        Effect::None => {}
        Effect::Log(line) => session.observer.on_log(LogEvent::new(line)),
        Effect::Complete(result) => session.observer.on_complete(result),
        Effect::Fail(error) => session.observer.on_fail(error),
    }
    next.is_resolved()
}

/// Opens progress streams on an [`EventSource`].
#[derive(Clone)]
pub struct SessionStreamClient {
    source: Arc<dyn EventSource>,
}

impl SessionStreamClient {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }

    /// Start streaming `session` into `observer`.
    ///
    /// Never fails directly: a channel that cannot be opened is reported
    /// through `on_fail`. Must be called within a tokio runtime.
    pub fn open(&self, session: SessionHandle, observer: impl StreamObserver + 'static) -> StreamHandle {
        let shared = Arc::new(Mutex::new(Session {
            state: StreamState::Open,
            observer: Box::new(observer),
        }));

        let task = tokio::spawn(pump(
            Arc::clone(&self.source),
            session.clone(),
            Arc::clone(&shared),
        ));

        StreamHandle {
            session,
            shared,
            task: task.abort_handle(),
        }
    }
}

impl std::fmt::Debug for SessionStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStreamClient")
            .field("source", &self.source.name())
            .finish()
    }
}

async fn pump(source: Arc<dyn EventSource>, session: SessionHandle, shared: Arc<Mutex<Session>>) {
    let mut frames = match source.open(&session).await {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!(%session, error = %e, "failed to open log stream");
            apply(
                &shared,
                StreamInput::ChannelError(format!("Failed to open log stream: {}", e)),
            );
            return;
        }
    };

    while let Some(item) = frames.next().await {
        let input = match item {
            Ok(data) => match parse_frame(&data) {
                Some(event) => StreamInput::Event(event),
                None => continue,
            },
            Err(e) => {
                tracing::warn!(%session, error = %e, "log stream failed");
                StreamInput::ChannelError(format!("{}: {}", state::CONNECTION_LOST, e))
            }
        };
        if apply(&shared, input) {
            tracing::debug!(%session, "log stream closed after terminal event");
            return;
        }
    }

    tracing::warn!(%session, "log stream ended without a terminal event");
    apply(&shared, StreamInput::ChannelClosed);
}

/// Cancellation handle of one open stream.
pub struct StreamHandle {
    session: SessionHandle,
    shared: Arc<Mutex<Session>>,
    task: AbortHandle,
}

impl StreamHandle {
    /// Close the channel. No callback fires after this returns.
    /// A no-op once the stream has resolved.
    pub fn cancel(&self) {
        apply(&self.shared, StreamInput::Cancel);
        self.task.abort();
        tracing::debug!(session = %self.session, "log stream cancelled");
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn is_resolved(&self) -> bool {
        lock_session(&self.shared).state.is_resolved()
    }

    /// How the stream ended, if it has.
    pub fn resolution(&self) -> Option<Resolution> {
        match lock_session(&self.shared).state {
            StreamState::Open => None,
            StreamState::Resolved(r) => Some(r),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("session", &self.session)
            .field("resolution", &self.resolution())
            .finish()
    }
}
