//! # Audio Decoder Module
//!
//! Whole-track decoding to interleaved signed 16-bit PCM.
//!
//! ## Overview
//!
//! [`SymphoniaDecoder`] implements [`TrackDecoder`](crate::traits::TrackDecoder)
//! on top of Symphonia's probe and codec registry. Every container and codec
//! Symphonia ships with is enabled, so MP3, FLAC, Vorbis, AAC, ALAC and WAV
//! payloads decode without configuration.
//!
//! ```text
//! Bytes → MediaSourceStream → FormatReader → Decoder → SampleConverter → DecodedAudio
//! ```
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use core_playback::{SymphoniaDecoder, TrackDecoder};
//!
//! # fn example(payload: Bytes) -> core_playback::Result<()> {
//! let audio = SymphoniaDecoder::new().decode(payload, Some("mp3"))?;
//! println!("{} frames at {} Hz", audio.frames(), audio.sample_rate);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure surfaces as [`PlaybackError::Decode`](crate::PlaybackError::Decode):
//! an empty payload, an unrecognized container, a codec without a decoder,
//! a mid-track format change, more than ten consecutive corrupt packets, or a
//! stream that yields no frames at all.

mod format_detector;
mod sample_converter;
mod symphonia;

pub use format_detector::{AudioCodec, FormatDetector};
pub use sample_converter::SampleConverter;
pub use self::symphonia::SymphoniaDecoder;
