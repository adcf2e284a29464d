//! HTTP Client Abstraction
//!
//! Streaming GET access to remote audio payloads. The core never buffers a
//! response through this trait; it receives an [`HttpStream`] and pulls the
//! body incrementally.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// GET request for one remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
        }
    }

    /// Bound on establishing the connection and receiving response headers.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Open response whose body is read incrementally.
pub struct HttpStream {
    pub status: u16,
    /// Declared body length, when the server sent one.
    pub content_length: Option<u64>,
    pub body: Box<dyn core_async::io::AsyncRead + Send + Unpin>,
}

impl HttpStream {
    pub fn new(status: u16, body: Box<dyn core_async::io::AsyncRead + Send + Unpin>) -> Self {
        Self {
            status,
            content_length: None,
            body,
        }
    }

    pub fn with_content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStream")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Async HTTP client trait
///
/// Implementations must:
/// - honour [`HttpRequest::timeout`] for connect plus response headers
/// - reject non-2xx responses with
///   [`BridgeError::Status`](crate::error::BridgeError::Status)
/// - never buffer the full body
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn first_bytes(client: &dyn HttpClient) -> Result<usize> {
///     let request = HttpRequest::get("https://example.com/track.mp3")
///         .timeout(Duration::from_secs(30));
///     let mut stream = client.download_stream(request).await?;
///     let mut buf = [0u8; 8192];
///     Ok(stream.body.read(&mut buf).await?)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Open a streaming response.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - The timeout elapses before headers arrive
    /// - The server answers with a non-success status
    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStream>;
}
