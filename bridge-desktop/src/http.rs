//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpRequest, HttpStream},
};
use futures_util::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - TLS support by default (rustls)
/// - Incremental body streaming for audio payloads
///
/// No whole-request timeout is configured on the underlying client, since a
/// track body may legitimately take minutes to arrive. The per-request
/// [`HttpRequest::timeout`] bounds connect plus response headers; the caller
/// bounds individual body reads.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new HTTP client with a custom TCP/TLS connect timeout
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .user_agent(concat!("showstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default reqwest client");
                Client::new()
            });

        Self { client }
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Send and wait for response headers, bounded by the request timeout.
    async fn send(&self, request: &HttpRequest) -> Result<reqwest::Response> {
        debug!(url = %request.url, timeout = ?request.timeout, "Executing HTTP request");

        let pending = self.client.get(&request.url).send();
        let outcome = match request.timeout {
            Some(limit) => core_async::time::timeout(limit, pending)
                .await
                .map_err(|_| BridgeError::Timeout(limit))?,
            None => pending.await,
        };

        let response = outcome.map_err(|e| Self::map_error(&request.url, e))?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            warn!(url = %request.url, status, "HTTP request rejected");
            return Err(BridgeError::Status {
                status,
                url: request.url.clone(),
            });
        }

        Ok(response)
    }

    fn map_error(url: &str, e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::OperationFailed(format!("Request to {} timed out: {}", url, e))
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("Connection to {} failed: {}", url, e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStream> {
        let response = self.send(&request).await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(HttpStream::new(status, Box::new(reader)).with_content_length(content_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let _client = ReqwestHttpClient::new();
        let _custom = ReqwestHttpClient::with_connect_timeout(Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_reported() {
        let client = ReqwestHttpClient::with_connect_timeout(Duration::from_millis(500));
        // Port 9 on the loopback interface is reserved (discard) and closed on CI hosts.
        let request = HttpRequest::get("http://127.0.0.1:9/track.mp3")
            .timeout(Duration::from_secs(2));

        let err = client.download_stream(request).await.unwrap_err();
        assert!(err.is_network());
    }
}
