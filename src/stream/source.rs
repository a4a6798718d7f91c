//! The event-source capability and a mock implementation.

use crate::error::{AnalysisError, Result};
use crate::types::SessionHandle;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Raw text frames of one session, in emission order.
///
/// An `Err` item means the channel itself failed; the stream ends after it.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Opens the server-push channel of a session.
///
/// Any transport works (SSE, polling, a message queue) as long as it yields
/// the session's frames in order. Dropping the returned stream closes the
/// channel.
///
/// Built-in implementations: [`SseEventSource`](crate::transport::SseEventSource),
/// [`MockEventSource`].
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, session: &SessionHandle) -> Result<FrameStream>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

enum Script {
    Frames {
        frames: Vec<Result<String>>,
        hold_open: bool,
    },
    Channel(Option<mpsc::UnboundedReceiver<Result<String>>>),
    FailOpen(String),
}

/// A test event source.
///
/// Either replays a fixed list of frames ([`new`](Self::new)) or forwards
/// frames pushed live through a [`FrameSender`] ([`channel`](Self::channel)).
pub struct MockEventSource {
    script: Mutex<Script>,
    opened: Mutex<Vec<SessionHandle>>,
}

/// Sending half of [`MockEventSource::channel`]. Dropping it ends the stream.
pub type FrameSender = mpsc::UnboundedSender<Result<String>>;

impl MockEventSource {
    /// Replay `frames` to every session, then end the stream.
    pub fn new<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(frames.into_iter().map(|f| Ok(f.into())).collect())
    }

    /// Replay frames, including channel errors.
    pub fn from_results(frames: Vec<Result<String>>) -> Self {
        Self::with_script(Script::Frames {
            frames,
            hold_open: false,
        })
    }

    /// A source whose single session receives whatever is sent on the
    /// returned [`FrameSender`].
    pub fn channel() -> (Self, FrameSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_script(Script::Channel(Some(rx))), tx)
    }

    /// A source whose `open` always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::FailOpen(message.into()))
    }

    /// Keep the stream open after the scripted frames instead of ending it.
    pub fn hold_open(self) -> Self {
        {
            let mut script = lock(&self.script);
            if let Script::Frames { hold_open, .. } = &mut *script {
                *hold_open = true;
            }
        }
        self
    }

    /// Sessions opened so far.
    pub fn opened(&self) -> Vec<SessionHandle> {
        lock(&self.opened).clone()
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            opened: Mutex::new(Vec::new()),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn replay(frame: &Result<String>) -> Result<String> {
    match frame {
        Ok(f) => Ok(f.clone()),
        Err(e) => Err(AnalysisError::Network(e.to_string())),
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn open(&self, session: &SessionHandle) -> Result<FrameStream> {
        lock(&self.opened).push(session.clone());

        let mut script = lock(&self.script);
        match &mut *script {
            Script::Frames { frames, hold_open } => {
                let frames: Vec<Result<String>> = frames.iter().map(replay).collect();
                let scripted = futures::stream::iter(frames);
                if *hold_open {
                    Ok(scripted.chain(futures::stream::pending()).boxed())
                } else {
                    Ok(scripted.boxed())
                }
            }
            Script::Channel(rx) => {
                let rx = rx.take().ok_or_else(|| {
                    AnalysisError::Network("mock channel already opened".into())
                })?;
                Ok(futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|frame| (frame, rx))
                })
                .boxed())
            }
            Script::FailOpen(message) => Err(AnalysisError::Network(message.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
