//! # Playback Error Types
//!
//! Errors surfaced by the gapless engine and its components.
//!
//! Two families exist:
//! - **Track-level** ([`PlaybackError::Connection`], [`PlaybackError::Decode`]):
//!   raised inside the worker for a single track. The engine reports them as an
//!   error event, skips the track, and keeps playing.
//! - **Caller-facing** (everything else): returned directly from a control call.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a track's bytes could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCause {
    /// Transport failure (DNS, refused, reset, TLS).
    Network(String),
    /// Server answered with a non-success status.
    Status(u16),
    /// Nothing arrived within the configured timeout.
    Timeout(Duration),
}

impl fmt::Display for ConnectionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionCause::Network(reason) => write!(f, "{}", reason),
            ConnectionCause::Status(status) => write!(f, "HTTP status {}", status),
            ConnectionCause::Timeout(after) => write!(f, "timed out after {:?}", after),
        }
    }
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Track-level Errors
    // ========================================================================
    /// The track's URL could not be opened or read.
    #[error("Connection error for {url}: {cause}")]
    Connection { url: String, cause: ConnectionCause },

    /// The fetched bytes are not decodable audio.
    #[error("Decode error: {reason}")]
    Decode { reason: String },

    // ========================================================================
    // Caller-facing Errors
    // ========================================================================
    /// A show with no tracks was loaded.
    #[error("Cannot load an empty queue")]
    EmptyQueue,

    /// Track index outside the loaded queue.
    #[error("Track index {index} out of range (queue has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The operation is not possible on a forward-only stream.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Transport control before any show was loaded.
    #[error("No show loaded")]
    NoShowLoaded,

    /// Engine configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Platform/Generic Errors
    // ========================================================================
    /// The audio sink refused to start or stop.
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub(crate) fn connection(url: impl Into<String>, cause: ConnectionCause) -> Self {
        PlaybackError::Connection {
            url: url.into(),
            cause,
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        PlaybackError::Decode {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the engine skips the track instead of failing the call.
    pub fn is_track_level(&self) -> bool {
        matches!(
            self,
            PlaybackError::Connection { .. } | PlaybackError::Decode { .. }
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(self, PlaybackError::Connection { .. })
    }

    /// Returns `true` if the error is a timeout on the network.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PlaybackError::Connection {
                cause: ConnectionCause::Timeout(_),
                ..
            }
        )
    }
}

/// Bridge failures reaching a control call come from the audio sink; HTTP
/// failures are mapped to [`PlaybackError::Connection`] where they occur.
impl From<bridge_traits::BridgeError> for PlaybackError {
    fn from(err: bridge_traits::BridgeError) -> Self {
        PlaybackError::AudioDevice(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
