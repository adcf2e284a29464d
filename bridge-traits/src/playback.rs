//! Playback bridge traits and supporting audio types.
//!
//! The core playback engine decodes audio into interleaved signed 16-bit PCM
//! and exposes it through a [`PcmSource`]. A host provides an [`AudioSink`]
//! that pulls from that source on its own schedule, usually from a realtime
//! device callback.
//!
//! ## Pull contract
//!
//! - `read` never blocks. When no frames are ready it returns
//!   [`PcmPull::Starved`] and the sink should emit silence.
//! - The first result other than `Starved` is either [`PcmPull::FormatChange`]
//!   announcing the initial format, or [`PcmPull::Finished`] when the stream
//!   ended without producing audio. A sink that has no format yet may call
//!   `read` with an empty buffer to wait for either.
//! - Sample counts are always a whole number of frames for the active format.
//! - A `FormatChange` is returned once, *before* the first sample of a
//!   different rate or channel count. The sink reconfigures and keeps pulling.
//! - After `Finished` the source yields nothing more.

use crate::error::Result;

/// Layout of the interleaved samples a [`PcmSource`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmFormat {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Whole frames contained in `samples` interleaved values.
    pub fn frames_in(&self, samples: usize) -> usize {
        if self.channels == 0 {
            0
        } else {
            samples / self.channels as usize
        }
    }
}

/// Outcome of a single [`PcmSource::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmPull {
    /// This many samples were written to the front of the output buffer.
    Samples(usize),
    /// Nothing is buffered right now; try again later.
    Starved,
    /// Subsequent samples use this format.
    FormatChange(PcmFormat),
    /// The stream has ended.
    Finished,
}

/// Non-blocking producer of interleaved i16 PCM.
pub trait PcmSource: Send {
    /// Fill `out` with up to `out.len()` samples.
    fn read(&mut self, out: &mut [i16]) -> PcmPull;
}

/// Consumer of decoded PCM, typically an audio device.
///
/// All three operations are idempotent.
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    /// Begin draining `source`. Any previously attached source is released.
    async fn start(&self, source: Box<dyn PcmSource>) -> Result<()>;

    /// Halt output and release the current source. Returns once the sink no
    /// longer reads from it.
    async fn stop(&self) -> Result<()>;

    /// Stop and free any device resources held by the sink.
    async fn close(&self) -> Result<()>;
}
