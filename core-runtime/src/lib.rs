//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback crates:
//! - Logging and tracing infrastructure
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the event broadcasting
//! mechanism observers use to follow playback.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
