//! [`Transport`] backed by `reqwest`.

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::{AnalysisError, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};

/// Sends requests to the analysis service over HTTP.
///
/// The client should not carry a global timeout: every call is bounded by
/// its own deadline in [`with_deadline`](crate::timeout::with_deadline).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Parse a base URL, rejecting ones that cannot take path segments.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
        AnalysisError::InvalidConfig(format!("invalid base URL '{}': {}", base_url, e))
    })?;
    if url.cannot_be_a_base() {
        return Err(AnalysisError::InvalidConfig(format!(
            "base URL '{}' cannot carry a path",
            base_url
        )));
    }
    Ok(url)
}

/// Append escaped path segments to `base`.
pub(crate) fn endpoint_url<I, S>(base: &Url, segments: I) -> Result<Url>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| AnalysisError::InvalidConfig(format!("base URL '{}' cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = endpoint_url(&self.base_url, &request.segments)?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
            Method::Delete => self.client.delete(url.clone()),
        };
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            AnalysisError::Network(format!("Failed to connect to {}: {}", url, e))
        })?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        tracing::debug!(%url, status, bytes = body.len(), "response received");

        Ok(HttpResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}
