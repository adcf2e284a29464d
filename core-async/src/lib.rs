//! Runtime abstraction layer for the playback crates.
//!
//! Every crate in the workspace reaches the async runtime through this crate
//! instead of naming Tokio directly. That keeps the executor choice in one
//! place and gives the engine a small, well-known set of primitives:
//!
//! - `task`: spawning async work and blocking (CPU-bound) work
//! - `time`: sleeps, timeouts and deadlines
//! - `sync`: channels, locks and the cooperative [`CancellationToken`](sync::CancellationToken)
//! - `io`: async byte-stream traits used by the HTTP bridge
//! - `runtime`: building a runtime for hosts that are not async themselves
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! # core_async::runtime::block_on(async {
//! let token = CancellationToken::new();
//! let child = token.child_token();
//!
//! let outcome = core_async::sync::cancellable(&child, async {
//!     sleep(Duration::from_millis(5)).await;
//!     7
//! })
//! .await;
//! assert_eq!(outcome, Some(7));
//! # });
//! ```

pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
