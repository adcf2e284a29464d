//! # Gapless Playback Engine
//!
//! Streams a multi-track program over HTTP and plays it as one continuous
//! PCM signal.
//!
//! ## Overview
//!
//! This crate handles:
//! - Forward-only remote byte sessions with per-read timeouts
//! - Whole-track decoding to interleaved i16 PCM (Symphonia)
//! - The playback queue and transport state machine
//! - A background producer with one-track look-ahead feeding a bounded
//!   handoff that the audio sink drains at its own pace
//! - Track-changed, position, error and finished notifications tagged with
//!   a play-session identifier
//!
//! ```text
//! PlaybackQueue → TrackProducer → SourceOpener/ByteSource → TrackDecoder
//!                      │
//!                      ▼ Handoff (bounded)
//!                 FrameSource ──pull──▶ AudioSink ──▶ device
//!                      │
//!                      ▼
//!                  EventBus ──▶ observers
//! ```
//!
//! Per-track failures (connection, decode) are reported and skipped; they
//! never stop the run. See [`GaplessEngine`] for the transport API.

pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
mod frames;
mod producer;
pub mod queue;
pub mod show;
pub mod source;
pub mod state;
pub mod traits;

pub use config::EngineConfig;
pub use decoder::{AudioCodec, FormatDetector, SampleConverter, SymphoniaDecoder};
pub use engine::GaplessEngine;
pub use error::{ConnectionCause, PlaybackError, Result};
pub use queue::PlaybackQueue;
pub use show::{ShowData, TrackDescriptor};
pub use source::{HttpSourceOpener, RemoteByteSource};
pub use state::{PlaybackState, StatusSnapshot};
pub use traits::{ByteSource, DecodedAudio, SourceOpener, TrackDecoder};

pub use core_runtime::events::{CoreEvent, EventStream, PlaybackEvent, SessionId};
