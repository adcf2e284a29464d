//! # Format Detection Module
//!
//! Builds probe hints for Symphonia from track URLs and MIME types, and maps
//! Symphonia codec identifiers to names used in logs and errors.

use symphonia::core::codecs::CodecType;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Codec family of a decoded track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    Mp3,
    Aac,
    Flac,
    Vorbis,
    Opus,
    Pcm,
    Alac,
    Unknown,
}

/// Format detector for audio streams.
pub struct FormatDetector;

impl FormatDetector {
    /// Build a probe hint from either a file extension or a MIME type.
    ///
    /// ```rust
    /// use core_playback::FormatDetector;
    ///
    /// let _by_ext = FormatDetector::hint("mp3");
    /// let _by_mime = FormatDetector::hint("audio/mpeg");
    /// ```
    pub fn hint(value: &str) -> Hint {
        let mut hint = Hint::new();
        if value.contains('/') {
            debug!("Creating probe hint from MIME type: {}", value);
            hint.mime_type(value);
        } else {
            debug!("Setting probe hint extension: {}", value);
            hint.with_extension(value);
        }
        hint
    }

    /// Extract a plausible file extension from a track URL.
    ///
    /// Query strings and fragments are ignored. Returns `None` when the last
    /// path segment has no short alphanumeric extension.
    ///
    /// ```rust
    /// use core_playback::FormatDetector;
    ///
    /// assert_eq!(
    ///     FormatDetector::extension_from_url("https://cdn.example.org/gd77/d1t02.MP3?x=1"),
    ///     Some("mp3".to_string())
    /// );
    /// assert_eq!(FormatDetector::extension_from_url("https://example.org/stream"), None);
    /// ```
    pub fn extension_from_url(url: &str) -> Option<String> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let path = path.split_once("://").map_or(path, |(_, rest)| rest);
        let segment = path.rsplit('/').next()?;
        let (stem, extension) = segment.rsplit_once('.')?;

        if stem.is_empty()
            || extension.is_empty()
            || extension.len() > 5
            || !extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return None;
        }

        Some(extension.to_ascii_lowercase())
    }

    /// Detect audio codec from Symphonia codec type.
    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        use symphonia::core::codecs::*;

        if codec_type == CODEC_TYPE_MP3 || codec_type == CODEC_TYPE_MP2 || codec_type == CODEC_TYPE_MP1 {
            AudioCodec::Mp3
        } else if codec_type == CODEC_TYPE_AAC {
            AudioCodec::Aac
        } else if codec_type == CODEC_TYPE_FLAC {
            AudioCodec::Flac
        } else if codec_type == CODEC_TYPE_VORBIS {
            AudioCodec::Vorbis
        } else if codec_type == CODEC_TYPE_OPUS {
            AudioCodec::Opus
        } else if codec_type == CODEC_TYPE_ALAC {
            AudioCodec::Alac
        } else if codec_type == CODEC_TYPE_PCM_S16LE
            || codec_type == CODEC_TYPE_PCM_S16BE
            || codec_type == CODEC_TYPE_PCM_S24LE
            || codec_type == CODEC_TYPE_PCM_S24BE
            || codec_type == CODEC_TYPE_PCM_S32LE
            || codec_type == CODEC_TYPE_PCM_S32BE
            || codec_type == CODEC_TYPE_PCM_U8
            || codec_type == CODEC_TYPE_PCM_F32LE
            || codec_type == CODEC_TYPE_PCM_F32BE
            || codec_type == CODEC_TYPE_PCM_F64LE
            || codec_type == CODEC_TYPE_PCM_F64BE
        {
            AudioCodec::Pcm
        } else {
            warn!("Unknown codec type: {:?}", codec_type);
            AudioCodec::Unknown
        }
    }
}
