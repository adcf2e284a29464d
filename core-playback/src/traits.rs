//! # Core Playback Traits
//!
//! Seams between the gapless engine and the pieces it drives. These differ
//! from the bridge-traits definitions, which expose host capabilities; the
//! traits here describe engine-internal roles so tests can swap any of them.
//!
//! ## Roles
//!
//! - [`SourceOpener`] / [`ByteSource`]: forward-only byte stream for one
//!   track, owned by the worker for the duration of the fetch.
//! - [`TrackDecoder`]: turns a complete compressed payload into i16 PCM.
//!
//! ```text
//! SourceOpener::open(url) → ByteSource::read_all() → TrackDecoder::decode() → DecodedAudio
//! ```

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::playback::PcmFormat;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Decoded Audio
// ============================================================================

/// Fully decoded PCM for one track.
///
/// Samples are interleaved and shared read-only; slices of the same buffer are
/// handed to the sink without copying.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Interleaved signed 16-bit samples.
    pub samples: Arc<[i16]>,
}

impl DecodedAudio {
    pub fn new(sample_rate: u32, channels: u16, samples: impl Into<Arc<[i16]>>) -> Self {
        Self {
            sample_rate,
            channels,
            samples: samples.into(),
        }
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.format().frames_in(self.samples.len())
    }

    /// Playback length at the native rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(core_async::time::frames_to_secs(
            self.frames() as u64,
            self.sample_rate,
        ))
    }

    pub fn format(&self) -> PcmFormat {
        PcmFormat::new(self.sample_rate, self.channels)
    }
}

// ============================================================================
// Track Decoder
// ============================================================================

/// Stateless full-buffer decoder.
///
/// Implementations must be safe to call repeatedly and from several threads.
/// The engine runs `decode` on the blocking pool.
pub trait TrackDecoder: Send + Sync {
    /// Decode a complete payload.
    ///
    /// `hint` is a file extension or MIME type used to speed up probing.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Decode`] for empty, malformed, truncated or
    /// unsupported input.
    fn decode(&self, bytes: Bytes, hint: Option<&str>) -> Result<DecodedAudio>;
}

// ============================================================================
// Byte Source
// ============================================================================

/// Sequential, non-seekable reader over one remote resource.
#[async_trait]
pub trait ByteSource: Send {
    /// Read up to `max_bytes`. An empty result means end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Connection`] when the transport fails or
    /// nothing arrives within the configured timeout.
    async fn read_chunk(&mut self, max_bytes: usize) -> Result<Bytes>;

    /// Preferred size for [`read_chunk`](ByteSource::read_chunk) calls.
    fn chunk_size(&self) -> usize;

    /// Drain the remainder of the stream.
    async fn read_all(&mut self) -> Result<Bytes> {
        let chunk_size = self.chunk_size().max(1);
        let mut buffer = BytesMut::new();
        loop {
            let chunk = self.read_chunk(chunk_size).await?;
            if chunk.is_empty() {
                return Ok(buffer.freeze());
            }
            buffer.extend_from_slice(&chunk);
        }
    }

    /// Streams are forward-only.
    fn seek(&mut self, _offset: u64) -> Result<()> {
        Err(PlaybackError::UnsupportedOperation("seek on a remote byte stream"))
    }

    /// Release the connection. Idempotent.
    async fn close(&mut self);

    /// URL this source was opened for.
    fn url(&self) -> &str;

    /// Total bytes delivered so far.
    fn bytes_read(&self) -> u64;
}

/// Factory for [`ByteSource`] sessions.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    /// Open `url`, waiting at most `timeout` for the response to start.
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn ByteSource>>;
}
