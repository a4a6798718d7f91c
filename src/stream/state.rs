//! The `Open → Resolved` lifecycle of one progress stream.
//!
//! [`StreamState::transition`] is pure: it maps the current state and one
//! input to the next state and at most one [`Effect`]. Once resolved, every
//! input yields [`Effect::None`], which is what keeps the terminal callback
//! unique.

use crate::error::AnalysisError;
use crate::types::AnalysisResult;

pub(crate) const CONNECTION_LOST: &str = "Connection lost while streaming logs";

/// A well-formed frame from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Log(String),
    Completed(AnalysisResult),
    Failed(String),
}

/// Everything that can happen to an open stream.
#[derive(Debug)]
pub enum StreamInput {
    Event(StreamEvent),
    /// The channel failed; carries the full human-readable message.
    ChannelError(String),
    /// The channel ended without a terminal marker.
    ChannelClosed,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Resolved(Resolution),
}

/// Callback to run as a result of a transition.
#[derive(Debug)]
pub enum Effect {
    None,
    Log(String),
    Complete(AnalysisResult),
    Fail(AnalysisError),
}

impl StreamState {
    pub fn transition(self, input: StreamInput) -> (StreamState, Effect) {
        let StreamState::Open = self else {
            return (self, Effect::None);
        };

        match input {
            StreamInput::Event(StreamEvent::Log(line)) => (StreamState::Open, Effect::Log(line)),
            StreamInput::Event(StreamEvent::Completed(result)) => (
                StreamState::Resolved(Resolution::Completed),
                Effect::Complete(result),
            ),
            StreamInput::Event(StreamEvent::Failed(reason)) => (
                StreamState::Resolved(Resolution::Failed),
                Effect::Fail(AnalysisError::AnalysisFailed(reason)),
            ),
            StreamInput::ChannelError(message) => (
                StreamState::Resolved(Resolution::Failed),
                Effect::Fail(AnalysisError::Stream(message)),
            ),
            StreamInput::ChannelClosed => (
                StreamState::Resolved(Resolution::Failed),
                Effect::Fail(AnalysisError::Stream(CONNECTION_LOST.into())),
            ),
            StreamInput::Cancel => (StreamState::Resolved(Resolution::Cancelled), Effect::None),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, StreamState::Resolved(_))
    }
}
