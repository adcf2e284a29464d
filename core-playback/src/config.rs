//! # Engine Configuration
//!
//! Tunables for the gapless engine: network timeouts, chunk sizes and the
//! depth of the producer → sink handoff.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gapless engine configuration.
///
/// Durations are (de)serialized as integer milliseconds:
///
/// ```rust
/// use core_playback::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "http_timeout": 5000, "read_chunk_bytes": 4096 }"#).unwrap();
/// assert_eq!(config.http_timeout.as_secs(), 5);
/// assert_eq!(config.read_chunk_bytes, 4096);
/// assert!(config.prefetch_next_track);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound on opening a track URL and on every subsequent chunk read.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_http_timeout", with = "millis")]
    pub http_timeout: Duration,

    /// Maximum bytes requested from the network per read.
    ///
    /// Default: 8 KiB.
    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,

    /// Frames per chunk handed to the sink.
    ///
    /// Cancellation and position granularity are bounded by this.
    ///
    /// Default: 4096 frames (~93ms at 44.1kHz).
    #[serde(default = "default_delivery_chunk_frames")]
    pub delivery_chunk_frames: usize,

    /// Capacity of the bounded handoff, in chunks.
    ///
    /// Default: 16 chunks (~1.5s at 44.1kHz with the default chunk size).
    #[serde(default = "default_handoff_capacity_chunks")]
    pub handoff_capacity_chunks: usize,

    /// Minimum interval between position events.
    ///
    /// Default: 250 ms.
    #[serde(default = "default_position_interval", with = "millis")]
    pub position_interval: Duration,

    /// Fetch and decode track `i+1` while track `i` is delivered.
    ///
    /// Default: true.
    #[serde(default = "default_prefetch_next_track")]
    pub prefetch_next_track: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout: default_http_timeout(),
            read_chunk_bytes: default_read_chunk_bytes(),
            delivery_chunk_frames: default_delivery_chunk_frames(),
            handoff_capacity_chunks: default_handoff_capacity_chunks(),
            position_interval: default_position_interval(),
            prefetch_next_track: default_prefetch_next_track(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration optimized for responsiveness.
    ///
    /// - Shorter network timeout
    /// - Small delivery chunks, shallow handoff
    /// - Frequent position updates
    pub fn low_latency() -> Self {
        Self {
            http_timeout: Duration::from_secs(10),
            delivery_chunk_frames: 1024,
            handoff_capacity_chunks: 8,
            position_interval: Duration::from_millis(100),
            ..Default::default()
        }
    }

    /// Create a configuration that keeps at most one decoded track in memory.
    pub fn low_memory() -> Self {
        Self {
            handoff_capacity_chunks: 4,
            prefetch_next_track: false,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.http_timeout.is_zero() {
            return Err("http_timeout must be > 0".to_string());
        }

        if self.read_chunk_bytes == 0 {
            return Err("read_chunk_bytes must be > 0".to_string());
        }

        if self.delivery_chunk_frames == 0 {
            return Err("delivery_chunk_frames must be > 0".to_string());
        }

        if self.handoff_capacity_chunks == 0 {
            return Err("handoff_capacity_chunks must be > 0".to_string());
        }

        if self.position_interval.is_zero() {
            return Err("position_interval must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_read_chunk_bytes() -> usize {
    8 * 1024
}

fn default_delivery_chunk_frames() -> usize {
    4096
}

fn default_handoff_capacity_chunks() -> usize {
    16
}

fn default_position_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_prefetch_next_track() -> bool {
    true
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
