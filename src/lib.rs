//! Workspace facade crate.
//!
//! Exposes feature flags that map onto the individual workspace crates so a
//! host application can depend on `showstream` alone:
//!
//! - `desktop-shims` (default): the playback engine, runtime services and the
//!   desktop bridge implementations (reqwest HTTP, headless sink).
//! - `device-output`: additionally enables the cpal-backed device sink.

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
#[cfg(feature = "desktop-shims")]
pub use core_playback;
#[cfg(feature = "desktop-shims")]
pub use core_runtime;
