//! # Heat Analysis Client
//!
//! Async client for a remote urban-heat-island analysis service: submit a
//! job for a coordinate and date range, follow its progress log live, and
//! collect the hotspot summary when the server finishes.
//!
//! ```text
//! AnalysisOrchestrator::run
//!   ├─ validate()                     ValidatedParameters, no network
//!   ├─ AnalysisClient::probe()        GET /health          (5s)
//!   ├─ AnalysisClient::submit()       POST /analyze        (300s, retried)
//!   │     └─ with_backoff ─► Transport::send
//!   └─ SessionStreamClient::open()    GET /logs/{id}       (SSE, until terminal)
//!         └─ EventSource ─► parse_frame ─► StreamState ─► StreamObserver
//! ```
//!
//! ## Core Concepts
//!
//! - **[`AnalysisOrchestrator`]**: runs one job end to end and resolves with
//!   an [`AnalysisResult`] or an [`AnalysisError`].
//! - **[`AnalysisClient`]**: one method per service endpoint, each bounded by
//!   its own deadline from [`Timeouts`].
//! - **[`Transport`](transport::Transport)** and
//!   **[`EventSource`](stream::EventSource)**: the two I/O seams. Both have a
//!   reqwest-backed and a mock implementation.
//! - **[`Geocoder`]** and **[`HistoryStore`](history::HistoryStore)**:
//!   optional helpers around the job flow. Neither can fail a job.
//!
//! ## Quick Start
//!
//! ```no_run
//! use heat_analysis_client::{
//!     AnalysisClient, AnalysisOrchestrator, AnalysisParameters, ClientConfig, LogEvent,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnalysisClient::new(ClientConfig::from_env())?;
//!     let orchestrator = AnalysisOrchestrator::new(client);
//!
//!     let params = AnalysisParameters {
//!         latitude: 29.52,
//!         longitude: 74.99,
//!         ..Default::default()
//!     };
//!     let result = orchestrator
//!         .run(&params, &mut |log: LogEvent| println!("{}", log.message))
//!         .await?;
//!
//!     println!("{} hotspots, {} priority zones", result.hotspots_found, result.priority_zones.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod geocode;
pub mod history;
pub mod orchestrator;
pub mod stream;
pub mod timeout;
pub mod transport;
pub mod types;
pub mod validate;

pub use client::AnalysisClient;
pub use config::ClientConfig;
pub use error::{AnalysisError, ErrorKind, Result};
pub use geocode::{Geocoder, LocationInfo, LocationMatch};
pub use history::{HistoryRecord, HistoryStore, InMemoryHistoryStore, JsonFileHistoryStore};
pub use orchestrator::AnalysisOrchestrator;
pub use stream::{FnObserver, SessionStreamClient, StreamHandle, StreamObserver};
pub use timeout::{with_deadline, Timeouts};
pub use transport::{MockTransport, RetryPolicy};
pub use types::{
    AnalysisParameters, AnalysisPeriod, AnalysisResult, DeleteOutcome, LogEvent, PriorityZone,
    ResultPoll, SessionHandle,
};
pub use validate::{validate, ValidatedParameters};
