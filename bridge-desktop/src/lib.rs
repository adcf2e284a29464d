//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with a streaming body reader
//! - `AudioSink` as a headless, clock-paced consumer ([`NullAudioSink`])
//! - `AudioSink` on the default output device via `cpal` ([`CpalAudioSink`])
//!
//! ## Feature Flags
//!
//! - `device-output`: Enable the `cpal` device sink
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{NullAudioSink, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let sink = Arc::new(NullAudioSink::new());
//! // Hand both to the playback engine
//! ```

mod http;
mod null_sink;

#[cfg(feature = "device-output")]
mod output;

pub use http::ReqwestHttpClient;
pub use null_sink::NullAudioSink;

#[cfg(feature = "device-output")]
pub use output::CpalAudioSink;
