//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and
//! platform-specific implementations. The core never talks to a socket or an
//! audio device directly; it goes through these traits so tests can substitute
//! in-memory fakes and hosts can bring their own transport or output.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Streaming HTTP GET with timeouts
//! - [`AudioSink`](playback::AudioSink) - Consumer of decoded PCM
//! - [`PcmSource`](playback::PcmSource) - Non-blocking PCM pull interface the core hands to a sink
//!
//! ## Implementations
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! keep the context (URL, status) in the message.
//!
//! ## Thread Safety
//!
//! `HttpClient` and `AudioSink` require `Send + Sync` so a single instance can
//! be shared behind an `Arc` between the engine and its worker task.

pub mod error;
pub mod http;
pub mod playback;

pub use error::BridgeError;

pub use http::{HttpClient, HttpRequest, HttpStream};
pub use playback::{AudioSink, PcmFormat, PcmPull, PcmSource};
