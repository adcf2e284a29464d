//! # Remote Byte Source
//!
//! HTTP-backed [`ByteSource`] sessions. Every read is bounded by the
//! configured timeout, so a stalled server surfaces as a per-track
//! connection error instead of hanging the worker.

use crate::error::{ConnectionCause, PlaybackError, Result};
use crate::traits::{ByteSource, SourceOpener};
use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_async::io::{AsyncRead, AsyncReadExt};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// One open HTTP response body.
pub struct RemoteByteSource {
    url: String,
    body: Option<Box<dyn AsyncRead + Send + Unpin>>,
    timeout: Duration,
    chunk_size: usize,
    content_length: Option<u64>,
    bytes_read: u64,
    scratch: Vec<u8>,
}

impl RemoteByteSource {
    pub fn new(
        url: impl Into<String>,
        body: Box<dyn AsyncRead + Send + Unpin>,
        timeout: Duration,
        chunk_size: usize,
    ) -> Self {
        Self {
            url: url.into(),
            body: Some(body),
            timeout,
            chunk_size: chunk_size.max(1),
            content_length: None,
            bytes_read: 0,
            scratch: Vec::new(),
        }
    }

    pub fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }

    /// Length announced by the server, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn is_closed(&self) -> bool {
        self.body.is_none()
    }
}

#[async_trait]
impl ByteSource for RemoteByteSource {
    async fn read_chunk(&mut self, max_bytes: usize) -> Result<Bytes> {
        let Some(body) = self.body.as_mut() else {
            return Ok(Bytes::new());
        };

        self.scratch.resize(max_bytes.max(1), 0);
        let read = core_async::time::timeout(self.timeout, body.read(&mut self.scratch))
            .await
            .map_err(|_| {
                PlaybackError::connection(&self.url, ConnectionCause::Timeout(self.timeout))
            })?
            .map_err(|e| PlaybackError::connection(&self.url, ConnectionCause::Network(e.to_string())))?;

        self.bytes_read += read as u64;
        Ok(Bytes::copy_from_slice(&self.scratch[..read]))
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn close(&mut self) {
        if self.body.take().is_some() {
            debug!(
                url = %redact_url(&self.url),
                bytes_read = self.bytes_read,
                "Closed byte stream session"
            );
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// Opens [`RemoteByteSource`] sessions through a host [`HttpClient`].
pub struct HttpSourceOpener {
    client: Arc<dyn HttpClient>,
    chunk_size: usize,
}

impl HttpSourceOpener {
    pub fn new(client: Arc<dyn HttpClient>, chunk_size: usize) -> Self {
        Self { client, chunk_size }
    }

    fn map_bridge_error(url: &str, err: BridgeError) -> PlaybackError {
        let cause = match err {
            BridgeError::Timeout(after) => ConnectionCause::Timeout(after),
            BridgeError::Status { status, .. } => ConnectionCause::Status(status),
            other => ConnectionCause::Network(other.to_string()),
        };
        PlaybackError::connection(url, cause)
    }
}

#[async_trait]
impl SourceOpener for HttpSourceOpener {
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn ByteSource>> {
        let request = HttpRequest::get(url).timeout(timeout);

        let stream = core_async::time::timeout(timeout, self.client.download_stream(request))
            .await
            .map_err(|_| PlaybackError::connection(url, ConnectionCause::Timeout(timeout)))?
            .map_err(|e| Self::map_bridge_error(url, e))?;

        if !stream.is_success() {
            return Err(PlaybackError::connection(
                url,
                ConnectionCause::Status(stream.status),
            ));
        }

        match stream.content_length {
            Some(length) => debug!(content_length = length, "Opened byte stream session"),
            None => debug!("Opened byte stream session (length unknown)"),
        }

        let source = RemoteByteSource::new(url, stream.body, timeout, self.chunk_size)
            .with_content_length(stream.content_length);
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_in_bounded_chunks() {
        let body = Box::new(Cursor::new(vec![7u8; 20]));
        let mut source = RemoteByteSource::new("http://h/a.mp3", body, Duration::from_secs(1), 8);

        let first = source.read_chunk(8).await.unwrap();
        assert_eq!(first.len(), 8);
        assert_eq!(source.bytes_read(), 8);

        let rest = source.read_all().await.unwrap();
        assert_eq!(rest.len(), 12);
        assert_eq!(source.bytes_read(), 20);

        assert!(source.read_chunk(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_ends_stream() {
        let body = Box::new(Cursor::new(vec![1u8; 4]));
        let mut source = RemoteByteSource::new("http://h/a.mp3", body, Duration::from_secs(1), 8);

        source.close().await;
        source.close().await;

        assert!(source.is_closed());
        assert!(source.read_chunk(8).await.unwrap().is_empty());
        assert_eq!(source.url(), "http://h/a.mp3");
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let (reader, _writer) = tokio::io::duplex(64);
        let mut source = RemoteByteSource::new(
            "http://h/slow.mp3",
            Box::new(reader),
            Duration::from_millis(50),
            8,
        );

        let err = source.read_chunk(8).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_track_level());
    }

    #[test]
    fn bridge_errors_map_to_connection_causes() {
        let err = HttpSourceOpener::map_bridge_error(
            "http://h/x.mp3",
            BridgeError::Status {
                status: 404,
                url: "http://h/x.mp3".to_string(),
            },
        );
        assert!(matches!(
            err,
            PlaybackError::Connection {
                cause: ConnectionCause::Status(404),
                ..
            }
        ));

        let err = HttpSourceOpener::map_bridge_error(
            "http://h/x.mp3",
            BridgeError::Timeout(Duration::from_secs(3)),
        );
        assert!(err.is_timeout());
    }
}
