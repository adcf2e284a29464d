//! Headless audio sink.
//!
//! Pulls PCM at wall-clock rate (or faster) and throws it away. Used when no
//! audio device is available and by the integration tests.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioSink, PcmFormat, PcmPull, PcmSource},
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

const TICK: Duration = Duration::from_millis(10);

struct Worker {
    halt: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Sink that consumes PCM without producing sound.
///
/// `speed` scales the pull rate relative to real time: `1.0` behaves like a
/// device, `4.0` drains four times faster. A speed of `0.0` disables pacing
/// entirely.
pub struct NullAudioSink {
    speed: f64,
    worker: Mutex<Option<Worker>>,
    frames_consumed: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
}

impl NullAudioSink {
    pub fn new() -> Self {
        Self::with_speed(1.0)
    }

    pub fn with_speed(speed: f64) -> Self {
        Self {
            speed: speed.max(0.0),
            worker: Mutex::new(None),
            frames_consumed: Arc::new(AtomicU64::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Frames pulled since the sink was created.
    pub fn frames_consumed(&self) -> u64 {
        self.frames_consumed.load(Ordering::Relaxed)
    }

    /// True once the current source reported the end of its stream.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn run(
        mut source: Box<dyn PcmSource>,
        speed: f64,
        halt: Arc<AtomicBool>,
        frames_consumed: Arc<AtomicU64>,
        finished: Arc<AtomicBool>,
    ) {
        let mut format: Option<PcmFormat> = None;
        let mut scratch: Vec<i16> = Vec::new();

        while !halt.load(Ordering::Acquire) {
            let Some(active) = format else {
                match source.read(&mut []) {
                    PcmPull::FormatChange(f) => {
                        debug!(sample_rate = f.sample_rate, channels = f.channels, "Null sink configured");
                        format = Some(f);
                    }
                    PcmPull::Finished => {
                        finished.store(true, Ordering::Release);
                        debug!("Source finished before producing audio");
                        return;
                    }
                    PcmPull::Samples(_) | PcmPull::Starved => thread::sleep(TICK),
                }
                continue;
            };

            let frames_per_tick = if speed == 0.0 {
                active.sample_rate as usize
            } else {
                ((active.sample_rate as f64 * TICK.as_secs_f64() * speed) as usize).max(1)
            };
            scratch.resize(frames_per_tick * active.channels.max(1) as usize, 0);

            let mut filled = 0;
            let mut starved = false;
            while filled < scratch.len() {
                match source.read(&mut scratch[filled..]) {
                    PcmPull::Samples(0) | PcmPull::Starved => {
                        starved = true;
                        break;
                    }
                    PcmPull::Samples(n) => filled += n,
                    PcmPull::FormatChange(next) => {
                        debug!(sample_rate = next.sample_rate, channels = next.channels, "Null sink reconfigured");
                        format = Some(next);
                        break;
                    }
                    PcmPull::Finished => {
                        frames_consumed.fetch_add(active.frames_in(filled) as u64, Ordering::Relaxed);
                        finished.store(true, Ordering::Release);
                        debug!("Null sink reached end of stream");
                        return;
                    }
                }
            }
            frames_consumed.fetch_add(active.frames_in(filled) as u64, Ordering::Relaxed);

            if speed > 0.0 {
                trace!(filled, starved, "Null sink tick");
                thread::sleep(TICK);
            } else if starved {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    async fn halt_worker(&self) -> Result<()> {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.halt.store(true, Ordering::Release);
            core_async::task::spawn_blocking(move || worker.handle.join())
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?
                .map_err(|_| BridgeError::OperationFailed("null sink thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Default for NullAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for NullAudioSink {
    async fn start(&self, source: Box<dyn PcmSource>) -> Result<()> {
        self.halt_worker().await?;
        self.finished.store(false, Ordering::Release);

        let halt = Arc::new(AtomicBool::new(false));
        let speed = self.speed;
        let thread_halt = Arc::clone(&halt);
        let frames = Arc::clone(&self.frames_consumed);
        let finished = Arc::clone(&self.finished);

        let handle = thread::Builder::new()
            .name("null-audio-sink".to_string())
            .spawn(move || Self::run(source, speed, thread_halt, frames, finished))
            .map_err(BridgeError::Io)?;

        *self.worker.lock() = Some(Worker { halt, handle });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.halt_worker().await
    }

    async fn close(&self) -> Result<()> {
        self.halt_worker().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counted {
        format: PcmFormat,
        announced: bool,
        remaining: usize,
    }

    impl Counted {
        fn new(format: PcmFormat, remaining: usize) -> Self {
            Self {
                format,
                announced: false,
                remaining,
            }
        }
    }

    impl PcmSource for Counted {
        fn read(&mut self, out: &mut [i16]) -> PcmPull {
            if !self.announced {
                self.announced = true;
                return PcmPull::FormatChange(self.format);
            }
            if self.remaining == 0 {
                return PcmPull::Finished;
            }
            let n = out.len().min(self.remaining);
            out[..n].fill(0);
            self.remaining -= n;
            PcmPull::Samples(n)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unpaced_sink_drains_source() {
        let sink = NullAudioSink::with_speed(0.0);
        sink.start(Box::new(Counted::new(PcmFormat::new(8_000, 2), 8_000)))
        .await
        .unwrap();

        for _ in 0..200 {
            if sink.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(sink.is_finished());
        assert_eq!(sink.frames_consumed(), 4_000);
        sink.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_is_idempotent() {
        let sink = NullAudioSink::new();
        sink.stop().await.unwrap();

        sink.start(Box::new(Counted::new(PcmFormat::new(8_000, 1), usize::MAX)))
        .await
        .unwrap();

        sink.stop().await.unwrap();
        sink.stop().await.unwrap();
        sink.close().await.unwrap();
        assert!(!sink.is_finished());
    }
}
