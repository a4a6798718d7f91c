//! One analysis job from parameters to result.
//!
//! ```text
//! validate ──► probe /health ──► submit /analyze ──► stream /logs/{id} ──► result
//!    │              │                  │                    │
//!    └─ Validation  └─ Network         └─ Server/Network    └─ AnalysisFailed/Stream
//! ```
//!
//! Every failure after validation also produces one closing log line,
//! `✗ Analysis failed: <reason>`, so a progress view always ends with the
//! outcome.

use crate::client::AnalysisClient;
use crate::error::{AnalysisError, Result};
use crate::stream::{state::CONNECTION_LOST, StreamHandle, StreamMessage};
use crate::types::{AnalysisParameters, AnalysisResult, LogEvent};
use crate::validate::{validate, ValidatedParameters};
use tokio::sync::mpsc;

/// Drives analysis jobs against one [`AnalysisClient`].
///
/// # Example
///
/// ```no_run
/// use heat_analysis_client::{
///     AnalysisClient, AnalysisOrchestrator, AnalysisParameters, ClientConfig, LogEvent,
/// };
///
/// # async fn run() -> heat_analysis_client::Result<()> {
/// let orchestrator = AnalysisOrchestrator::new(AnalysisClient::new(ClientConfig::from_env())?);
/// let result = orchestrator
///     .run(&AnalysisParameters::default(), &mut |log: LogEvent| println!("{}", log.message))
///     .await?;
/// println!("{} hotspots in {} clusters", result.hotspots_found, result.clusters);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AnalysisOrchestrator {
    client: AnalysisClient,
}

/// Cancels the stream if the run is abandoned before it resolves.
struct CancelOnDrop(StreamHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl AnalysisOrchestrator {
    pub fn new(client: AnalysisClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AnalysisClient {
        &self.client
    }

    /// Run one job, relaying progress lines to `on_log` in arrival order.
    ///
    /// Invalid parameters fail before any network call. An unreachable
    /// service fails with `Network("service not reachable")` without
    /// submitting. Submission happens at most once per call, retries aside.
    #[tracing::instrument(
        name = "analysis",
        skip_all,
        fields(
            latitude = params.latitude,
            longitude = params.longitude,
            session = tracing::field::Empty
        )
    )]
    pub async fn run(
        &self,
        params: &AnalysisParameters,
        on_log: &mut (dyn FnMut(LogEvent) + Send),
    ) -> Result<AnalysisResult> {
        let validated = validate(params)?;

        match self.submit_and_stream(&validated, on_log).await {
            Ok(result) => {
                tracing::info!(
                    hotspots = result.hotspots_found,
                    clusters = result.clusters,
                    "analysis completed"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "analysis failed");
                on_log(LogEvent::new(format!("✗ Analysis failed: {}", failure_reason(&e))));
                Err(e)
            }
        }
    }

    async fn submit_and_stream(
        &self,
        params: &ValidatedParameters,
        on_log: &mut (dyn FnMut(LogEvent) + Send),
    ) -> Result<AnalysisResult> {
        if let Err(e) = self.client.probe().await {
            tracing::debug!(error = %e, "liveness probe failed");
            return Err(AnalysisError::Network("service not reachable".into()));
        }

        let session = self.client.submit(params).await?;
        tracing::Span::current().record("session", session.as_str());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _stream = CancelOnDrop(self.client.stream(&session, tx));

        while let Some(message) = rx.recv().await {
            match message {
                StreamMessage::Log(event) => on_log(event),
                StreamMessage::Completed(result) => return Ok(result),
                StreamMessage::Failed(e) => return Err(e),
            }
        }
        Err(AnalysisError::Stream(CONNECTION_LOST.into()))
    }
}

/// The reason shown after `✗ Analysis failed:`.
fn failure_reason(error: &AnalysisError) -> String {
    match error {
        AnalysisError::AnalysisFailed(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::ErrorKind;
    use crate::stream::MockEventSource;
    use crate::transport::{Method, MockReply, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn example_params() -> AnalysisParameters {
        AnalysisParameters {
            latitude: 29.52,
            longitude: 74.99,
            ..Default::default()
        }
    }

    fn healthy() -> MockTransport {
        MockTransport::new().route(
            Method::Get,
            "/health",
            vec![MockReply::json(200, json!({"status": "healthy"}))],
        )
    }

    fn accepting(transport: MockTransport) -> MockTransport {
        transport.route(
            Method::Post,
            "/analyze",
            vec![MockReply::json(202, json!({"sessionId": "abc123", "status": "started"}))],
        )
    }

    fn orchestrator(
        transport: MockTransport,
        source: MockEventSource,
    ) -> (AnalysisOrchestrator, Arc<MockTransport>, Arc<MockEventSource>) {
        let transport = Arc::new(transport);
        let source = Arc::new(source);
        let client =
            AnalysisClient::with_parts(ClientConfig::default(), transport.clone(), source.clone());
        (AnalysisOrchestrator::new(client), transport, source)
    }

    async fn run(orchestrator: &AnalysisOrchestrator) -> (Result<AnalysisResult>, Vec<String>) {
        let mut lines = Vec::new();
        let result = orchestrator
            .run(&example_params(), &mut |log: LogEvent| lines.push(log.message))
            .await;
        (result, lines)
    }

    #[tokio::test]
    async fn test_end_to_end_example() {
        let (orchestrator, transport, source) = orchestrator(
            accepting(healthy()),
            MockEventSource::new([
                r#"{"log":"Fetching data"}"#,
                r#"{"log":"Computing indices"}"#,
                r#"{"status":"completed","result":{"success":true,"hotspotsFound":42,"clusters":2}}"#,
            ]),
        );

        let (result, lines) = run(&orchestrator).await;
        let result = result.unwrap();
        assert_eq!(result.hotspots_found, 42);
        assert_eq!(lines, vec!["Fetching data", "Computing indices"]);
        assert_eq!(transport.calls_to("/health"), 1);
        assert_eq!(transport.calls_to("/analyze"), 1);
        assert_eq!(source.opened()[0].as_str(), "abc123");
    }

    #[tokio::test]
    async fn test_invalid_parameters_make_no_network_calls() {
        let (orchestrator, transport, source) =
            orchestrator(accepting(healthy()), MockEventSource::new(Vec::<String>::new()));

        let mut lines = Vec::new();
        let params = AnalysisParameters {
            latitude: 120.0,
            ..Default::default()
        };
        let err = orchestrator
            .run(&params, &mut |log: LogEvent| lines.push(log.message))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Latitude must be between -90 and 90");
        assert!(lines.is_empty());
        assert_eq!(transport.call_count(), 0);
        assert!(source.opened().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_skips_submission() {
        let transport = accepting(
            MockTransport::new().route(Method::Get, "/health", vec![MockReply::fail("refused")]),
        );
        let (orchestrator, transport, _) =
            orchestrator(transport, MockEventSource::new(Vec::<String>::new()));

        let (result, lines) = run(&orchestrator).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.to_string(), "service not reachable");
        assert_eq!(transport.calls_to("/analyze"), 0);
        assert_eq!(lines, vec!["✗ Analysis failed: service not reachable"]);
    }

    #[tokio::test]
    async fn test_server_reported_failure() {
        let (orchestrator, _, _) = orchestrator(
            accepting(healthy()),
            MockEventSource::new([
                r#"{"log":"Fetching data"}"#,
                r#"{"status":"failed","error":"No images found for the selected period"}"#,
            ]),
        );

        let (result, lines) = run(&orchestrator).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AnalysisFailed);
        assert_eq!(
            lines,
            vec![
                "Fetching data",
                "✗ Analysis failed: No images found for the selected period",
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_submission() {
        let transport = healthy().route(
            Method::Post,
            "/analyze",
            vec![MockReply::json(400, json!({"error": "Invalid coordinates"}))],
        );
        let (orchestrator, transport, source) =
            orchestrator(transport, MockEventSource::new(Vec::<String>::new()));

        let (result, lines) = run(&orchestrator).await;
        let err = result.unwrap_err();
        assert!(matches!(err, AnalysisError::Server { status: 400, .. }));
        assert_eq!(transport.calls_to("/analyze"), 1);
        assert!(source.opened().is_empty());
        assert_eq!(lines, vec!["✗ Analysis failed: HTTP 400: Invalid coordinates"]);
    }

    #[tokio::test]
    async fn test_stream_dropped_mid_analysis() {
        let (orchestrator, _, _) = orchestrator(
            accepting(healthy()),
            MockEventSource::new([r#"{"log":"Fetching data"}"#]),
        );

        let (result, lines) = run(&orchestrator).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Stream);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], format!("✗ Analysis failed: {}", CONNECTION_LOST));
    }

    #[tokio::test]
    async fn test_abandoned_run_cancels_stream() {
        let (source, tx) = MockEventSource::channel();
        let (orchestrator, _, _) = orchestrator(accepting(healthy()), source);

        let mut lines = Vec::new();
        let params = example_params();
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            orchestrator.run(&params, &mut |log: LogEvent| lines.push(log.message)),
        )
        .await;
        assert!(outcome.is_err());

        // The reader task is gone, so the channel's receiver has been dropped.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(tx.send(Ok(r#"{"log":"late"}"#.into())).is_err());
        assert!(lines.is_empty());
    }
}
