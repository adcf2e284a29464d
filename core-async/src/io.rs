//! Async I/O traits.
//!
//! Re-exports the Tokio I/O traits used by the HTTP bridge to hand response
//! bodies to the playback core as plain byte readers.

pub use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, BufReader, ReadBuf};
