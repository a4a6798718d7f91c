//! High-level client for the heat-analysis service.
//!
//! [`AnalysisClient`] owns the configuration, one [`Transport`] for plain
//! request/response calls and one [`EventSource`] for progress streams. Each
//! method maps to exactly one endpoint and one deadline category.

use crate::config::ClientConfig;
use crate::error::{AnalysisError, Result};
use crate::stream::{EventSource, SessionStreamClient, StreamHandle, StreamObserver};
use crate::timeout::with_deadline;
use crate::transport::{
    with_backoff, HttpRequest, HttpResponse, ReqwestTransport, RetryCallback, SseEventSource,
    Transport,
};
use crate::types::{AnalysisParameters, AnalysisResult, DeleteOutcome, ResultPoll, SessionHandle};
use crate::validate::ValidatedParameters;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SUBMIT_TIMED_OUT: &str =
    "Analysis took too long. Please try with a smaller area or shorter date range.";
const PARAMETERS_TIMED_OUT: &str = "Server is not responding. Please check if backend is running.";
const DOWNLOAD_TIMED_OUT: &str = "Download took too long. Please try again.";

/// Replace a deadline error with `message`, keeping its `Network` kind.
fn explain_timeout(message: &'static str) -> impl FnOnce(AnalysisError) -> AnalysisError {
    move |e| match e {
        AnalysisError::Timeout(deadline) => {
            tracing::debug!(?deadline, "deadline exceeded");
            AnalysisError::Network(message.into())
        }
        other => other,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    session_id: Option<String>,
}

/// Client for one analysis service.
///
/// Cheap to clone; clones share the underlying connections.
///
/// # Example
///
/// ```no_run
/// use heat_analysis_client::{AnalysisClient, ClientConfig};
///
/// # async fn run() -> heat_analysis_client::Result<()> {
/// let client = AnalysisClient::new(ClientConfig::from_env())?;
/// if client.health_check().await {
///     let defaults = client.fetch_default_parameters().await?;
///     println!("default dataset: {}", defaults.dataset);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AnalysisClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    streams: SessionStreamClient,
}

impl AnalysisClient {
    /// Build a client that talks HTTP and reads progress over SSE.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        let transport = ReqwestTransport::new(http.clone(), &config.base_url)?;
        let source = SseEventSource::new(http, &config.base_url)?;
        Ok(Self::with_parts(config, Arc::new(transport), Arc::new(source)))
    }

    /// Build a client from explicit parts, e.g. [`MockTransport`](crate::transport::MockTransport)
    /// and [`MockEventSource`](crate::stream::MockEventSource) in tests.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        source: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            streams: SessionStreamClient::new(source),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `GET /health`. Any failure, including a timeout, reads as `false`.
    pub async fn health_check(&self) -> bool {
        match self.probe().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "health check failed");
                false
            }
        }
    }

    /// `GET /health`, reporting why the service is unreachable.
    pub async fn probe(&self) -> Result<()> {
        let resp = self
            .send_once(&HttpRequest::get(["health"]), self.config.timeouts.health)
            .await?;
        if resp.is_success() {
            Ok(())
        } else {
            Err(resp.to_server_error())
        }
    }

    /// `POST /analyze`, retried under the configured [`RetryPolicy`](crate::transport::RetryPolicy).
    pub async fn submit(&self, params: &ValidatedParameters) -> Result<SessionHandle> {
        self.submit_with_callback(params, None).await
    }

    /// Like [`submit`](Self::submit), invoking `on_retry` before each backoff sleep.
    pub async fn submit_with_callback(
        &self,
        params: &ValidatedParameters,
        on_retry: RetryCallback<'_>,
    ) -> Result<SessionHandle> {
        let body = serde_json::to_value(params)?;
        let resp = with_backoff(
            self.transport.as_ref(),
            &HttpRequest::post_json(["analyze"], body),
            &self.config.retry,
            self.config.timeouts.submit,
            on_retry,
        )
        .await
        .map_err(explain_timeout(SUBMIT_TIMED_OUT))?;

        let parsed: SubmitResponse = resp.json()?;
        match parsed.session_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                let session = SessionHandle::new(id);
                tracing::info!(%session, "analysis submitted");
                Ok(session)
            }
            None => Err(AnalysisError::Server {
                status: resp.status,
                message: "response did not include a session id".into(),
            }),
        }
    }

    /// `GET /parameters`: the server's suggested defaults.
    pub async fn fetch_default_parameters(&self) -> Result<AnalysisParameters> {
        let resp = self
            .send_checked(&HttpRequest::get(["parameters"]), self.config.timeouts.parameters)
            .await
            .map_err(explain_timeout(PARAMETERS_TIMED_OUT))?;
        resp.json()
    }

    /// `GET /download-map/{filename}`: the raw map artifact.
    pub async fn download_map(&self, filename: &str) -> Result<Vec<u8>> {
        let resp = self
            .send_checked(
                &HttpRequest::get(["download-map", filename]),
                self.config.timeouts.download,
            )
            .await
            .map_err(explain_timeout(DOWNLOAD_TIMED_OUT))?;
        tracing::debug!(filename, bytes = resp.body.len(), "map downloaded");
        Ok(resp.body)
    }

    /// Download a map artifact into `dir`, keeping its file name.
    pub async fn save_map(&self, filename: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let name = Path::new(filename);
        if filename.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return Err(AnalysisError::Validation(format!(
                "Invalid map file name: {}",
                filename
            )));
        }
        let bytes = self.download_map(filename).await?;
        let path = dir.as_ref().join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// `DELETE /delete-map/{filename}`, best effort.
    ///
    /// Failures are logged and reported as success, so callers can always
    /// drop their own record of the artifact.
    pub async fn delete_map(&self, filename: &str) -> DeleteOutcome {
        let result = async {
            let resp = self
                .send_checked(
                    &HttpRequest::delete(["delete-map", filename]),
                    self.config.timeouts.delete,
                )
                .await?;
            resp.json::<DeleteOutcome>()
        }
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(filename, error = %e, "map deletion failed; continuing");
                DeleteOutcome {
                    success: true,
                    message: None,
                }
            }
        }
    }

    /// `GET /analysis-result/{sessionId}`: poll a session without streaming.
    pub async fn fetch_result(&self, session: &SessionHandle) -> Result<ResultPoll> {
        let resp = self
            .send_once(
                &HttpRequest::get(["analysis-result", session.as_str()]),
                self.config.timeouts.parameters,
            )
            .await?;

        match resp.status {
            202 => Ok(ResultPoll::Running),
            200 => Ok(ResultPoll::Completed(resp.json::<AnalysisResult>()?)),
            500 => match resp.error_message() {
                Some(reason) => Err(AnalysisError::AnalysisFailed(reason)),
                None => Err(resp.to_server_error()),
            },
            _ => Err(resp.to_server_error()),
        }
    }

    /// Open the progress stream of `session`; see [`SessionStreamClient::open`].
    pub fn stream(
        &self,
        session: &SessionHandle,
        observer: impl StreamObserver + 'static,
    ) -> StreamHandle {
        self.streams.open(session.clone(), observer)
    }

    async fn send_once(
        &self,
        request: &HttpRequest,
        deadline: std::time::Duration,
    ) -> Result<HttpResponse> {
        with_deadline(deadline, self.transport.send(request)).await
    }

    async fn send_checked(
        &self,
        request: &HttpRequest,
        deadline: std::time::Duration,
    ) -> Result<HttpResponse> {
        let resp = self.send_once(request, deadline).await?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(resp.to_server_error())
        }
    }
}

impl std::fmt::Debug for AnalysisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisClient")
            .field("base_url", &self.config.base_url)
            .field("transport", &self.transport.name())
            .field("streams", &self.streams)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stream::MockEventSource;
    use crate::transport::{Method, MockReply, MockTransport};
    use crate::types::AnalysisParameters;
    use crate::validate::validate;
    use serde_json::json;
    use std::time::Duration;

    fn client(transport: MockTransport) -> (AnalysisClient, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let client = AnalysisClient::with_parts(
            ClientConfig::default(),
            transport.clone(),
            Arc::new(MockEventSource::new(Vec::<String>::new())),
        );
        (client, transport)
    }

    fn params() -> ValidatedParameters {
        validate(&AnalysisParameters::default()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (up, _) = client(MockTransport::new().route(
            Method::Get,
            "/health",
            vec![MockReply::json(200, json!({"status": "healthy"}))],
        ));
        assert!(up.health_check().await);

        let (down, _) = client(
            MockTransport::new().route(Method::Get, "/health", vec![MockReply::fail("refused")]),
        );
        assert!(!down.health_check().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_times_out_after_five_seconds() {
        let (client, _) =
            client(MockTransport::new().route(Method::Get, "/health", vec![MockReply::Hang]));
        let start = tokio::time::Instant::now();
        let err = client.probe().await.unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout(d) if d == Duration::from_secs(5)));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_get_user_facing_messages() {
        let (client, transport) = client(
            MockTransport::new()
                .route(Method::Post, "/analyze", vec![MockReply::Hang])
                .route(Method::Get, "/parameters", vec![MockReply::Hang])
                .route(Method::Get, "/download-map/heat_map.html", vec![MockReply::Hang]),
        );

        let err = client.submit(&params()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.to_string(), SUBMIT_TIMED_OUT);
        assert_eq!(transport.calls_to("/analyze"), 3);

        let err = client.fetch_default_parameters().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.to_string(), PARAMETERS_TIMED_OUT);

        let err = client.download_map("heat_map.html").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.to_string(), DOWNLOAD_TIMED_OUT);
    }

    #[tokio::test]
    async fn test_submit_returns_session() {
        let (client, transport) = client(MockTransport::new().route(
            Method::Post,
            "/analyze",
            vec![MockReply::json(202, json!({"sessionId": "abc123", "status": "started"}))],
        ));
        let session = client.submit(&params()).await.unwrap();
        assert_eq!(session.as_str(), "abc123");

        let sent = transport.requests();
        let body = sent[0].body.as_ref().unwrap();
        assert_eq!(body["startDate"], "2025-05-29");
        assert_eq!(body["dataset"], "LANDSAT/LC09/C02/T1_L2");
    }

    #[tokio::test]
    async fn test_submit_without_session_id_is_server_error() {
        let (client, _) = client(MockTransport::new().route(
            Method::Post,
            "/analyze",
            vec![MockReply::json(202, json!({"status": "started"}))],
        ));
        let err = client.submit(&params()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_retries_with_callback() {
        let (client, transport) = client(MockTransport::new().route(
            Method::Post,
            "/analyze",
            vec![
                MockReply::json(503, json!({"error": "busy"})),
                MockReply::json(202, json!({"sessionId": "s2"})),
            ],
        ));
        let mut seen = Vec::new();
        let mut record = |attempt: u32, _: Duration, reason: &str| {
            seen.push((attempt, reason.to_string()))
        };
        let session = client
            .submit_with_callback(&params(), Some(&mut record))
            .await
            .unwrap();
        assert_eq!(session.as_str(), "s2");
        assert_eq!(transport.call_count(), 2);
        assert_eq!(seen, vec![(2, "HTTP 503: busy".to_string())]);
    }

    #[tokio::test]
    async fn test_fetch_default_parameters() {
        let (client, _) = client(MockTransport::new().route(
            Method::Get,
            "/parameters",
            vec![MockReply::json(
                200,
                serde_json::to_value(AnalysisParameters::default()).unwrap(),
            )],
        ));
        let params = client.fetch_default_parameters().await.unwrap();
        assert_eq!(params, AnalysisParameters::default());
    }

    #[tokio::test]
    async fn test_download_and_save_map() {
        let name = "urban_heat_map_29.5_74.9.html";
        let (client, _) = client(MockTransport::new().route(
            Method::Get,
            format!("/download-map/{}", name),
            vec![MockReply::bytes(200, "<html>map</html>")],
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = client.save_map(name, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join(name));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html>map</html>");
    }

    #[tokio::test]
    async fn test_save_map_rejects_paths() {
        let (client, transport) = client(MockTransport::new());
        let dir = tempfile::tempdir().unwrap();
        for bad in ["", "../escape.html", "nested/map.html"] {
            let err = client.save_map(bad, dir.path()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_download_missing_map() {
        let (client, _) = client(MockTransport::new());
        let err = client.download_map("gone.html").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Server { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_delete_map_is_best_effort() {
        let (ok, _) = client(MockTransport::new().route(
            Method::Delete,
            "/delete-map/m.html",
            vec![MockReply::json(200, json!({"success": true, "message": "Map file deleted"}))],
        ));
        let outcome = ok.delete_map("m.html").await;
        assert!(outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Map file deleted"));

        let (failing, _) = client(MockTransport::new().route(
            Method::Delete,
            "/delete-map/m.html",
            vec![MockReply::json(500, json!({"error": "disk full"}))],
        ));
        let outcome = failing.delete_map("m.html").await;
        assert!(outcome.success);
        assert_eq!(outcome.message, None);
    }

    #[tokio::test]
    async fn test_fetch_result_states() {
        let (client, _) = client(
            MockTransport::new()
                .route(
                    Method::Get,
                    "/analysis-result/run",
                    vec![MockReply::json(202, json!({"status": "running"}))],
                )
                .route(
                    Method::Get,
                    "/analysis-result/done",
                    vec![MockReply::json(200, json!({"success": true, "hotspotsFound": 42}))],
                )
                .route(
                    Method::Get,
                    "/analysis-result/bad",
                    vec![MockReply::json(500, json!({"error": "No images found"}))],
                ),
        );

        assert_eq!(
            client.fetch_result(&SessionHandle::new("run")).await.unwrap(),
            ResultPoll::Running
        );
        match client.fetch_result(&SessionHandle::new("done")).await.unwrap() {
            ResultPoll::Completed(r) => assert_eq!(r.hotspots_found, 42),
            other => panic!("unexpected {:?}", other),
        }
        let err = client
            .fetch_result(&SessionHandle::new("bad"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Analysis failed: No images found");
        let err = client
            .fetch_result(&SessionHandle::new("unknown"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Server { status: 404, .. }));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig::builder("http://localhost:5000/api")
            .retry(crate::transport::RetryPolicy::standard().with_max_attempts(0))
            .build();
        assert!(matches!(
            AnalysisClient::new(config),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }
}
