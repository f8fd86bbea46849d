//! Chart source abstraction and HTTP implementation
//!
//! The pipeline fetches through the [`ChartSource`] trait so tests (and
//! embedders with bespoke data providers) can substitute the transport. The
//! shipped implementation issues a blocking-style GET against
//! `{api_url}/{symbol}/{timeframe}` and returns the raw response body.

use crate::error::FetchError;
use crate::types::AssetJob;
use async_trait::async_trait;
use std::time::Duration;

/// Default per-request timeout for the HTTP source
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A provider of chart artifacts for asset jobs
#[async_trait]
pub trait ChartSource: Send + Sync {
    /// Fetch the chart bytes for one job
    ///
    /// Any failure is classified into a [`FetchError`] kind; the caller's
    /// retry policy decides what happens next.
    async fn fetch_chart(&self, job: &AssetJob) -> Result<Vec<u8>, FetchError>;
}

/// HTTP chart source backed by a shared reqwest client
#[derive(Clone, Debug)]
pub struct HttpChartSource {
    client: reqwest::Client,
}

impl HttpChartSource {
    /// Create a source with the default request timeout
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Create a source with a caller-provided client (custom timeouts,
    /// proxies, TLS settings)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpChartSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartSource for HttpChartSource {
    async fn fetch_chart(&self, job: &AssetJob) -> Result<Vec<u8>, FetchError> {
        let url = job.request_url();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        tracing::debug!(
            symbol = %job.symbol,
            timeframe = %job.timeframe,
            bytes = bytes.len(),
            "chart fetched"
        );
        Ok(bytes.to_vec())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job_for(server_uri: &str) -> AssetJob {
        AssetJob {
            symbol: "BTC".into(),
            timeframe: "1D".into(),
            file_format: "png".into(),
            api_url: format!("{server_uri}/chart"),
            output_dir: PathBuf::from("charts"),
            notification_method: "log".into(),
        }
    }

    #[tokio::test]
    async fn successful_fetch_returns_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chart/BTC/1D"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .mount(&server)
            .await;

        let source = HttpChartSource::new();
        let bytes = source.fetch_chart(&job_for(&server.uri())).await.unwrap();
        assert_eq!(bytes, b"PNGDATA");
    }

    #[tokio::test]
    async fn non_success_status_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chart/BTC/1D"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpChartSource::new();
        let err = source.fetch_chart(&job_for(&server.uri())).await.unwrap_err();
        match err {
            FetchError::Status { status, url } => {
                assert_eq!(status, 503);
                assert!(url.ends_with("/chart/BTC/1D"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn not_found_is_a_status_error_too() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chart/BTC/1D"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpChartSource::new();
        let err = source.fetch_chart(&job_for(&server.uri())).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_class_error() {
        // Nothing listens on this port
        let source = HttpChartSource::new();
        let err = source
            .fetch_chart(&job_for("http://127.0.0.1:9"))
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                FetchError::Connect { .. } | FetchError::Transport { .. } | FetchError::Timeout { .. }
            ),
            "expected a transport-level kind, got {err:?}"
        );
    }
}
