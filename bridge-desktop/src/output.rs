//! CPAL-backed audio device sink.
//!
//! The `cpal::Stream` is not `Send` on every platform, so a dedicated control
//! thread owns it. The realtime callback pulls from the shared [`PcmSource`];
//! when the source announces a new format or the end of the stream, the
//! callback goes silent and the control thread rebuilds or drops the stream.
//! A format change between tracks is the only point where the device stream
//! is re-created.
//!
//! There is no resampler: a track whose rate and channel count the device
//! does not support ends the control thread, and releasing the source
//! reports the failure to the engine.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioSink, PcmFormat, PcmPull, PcmSource},
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const CONTROL_TICK: Duration = Duration::from_millis(5);

/// State shared between the control thread and the realtime callback.
struct Shared {
    source: Mutex<Box<dyn PcmSource>>,
    /// Set by the callback once it has seen a format change or the end.
    halted: AtomicBool,
    pending_format: Mutex<Option<PcmFormat>>,
    finished: AtomicBool,
}

impl Shared {
    /// Pull into `out`, padding with silence. Returns early on a boundary.
    fn fill(&self, out: &mut [i16]) {
        let mut filled = 0;
        if !self.halted.load(Ordering::Acquire) {
            let mut source = self.source.lock();
            while filled < out.len() {
                match source.read(&mut out[filled..]) {
                    PcmPull::Samples(0) | PcmPull::Starved => break,
                    PcmPull::Samples(n) => filled += n,
                    PcmPull::FormatChange(next) => {
                        *self.pending_format.lock() = Some(next);
                        self.halted.store(true, Ordering::Release);
                        break;
                    }
                    PcmPull::Finished => {
                        self.finished.store(true, Ordering::Release);
                        self.halted.store(true, Ordering::Release);
                        break;
                    }
                }
            }
        }
        out[filled..].fill(0);
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Sink that plays PCM on the default output device.
pub struct CpalAudioSink {
    worker: Mutex<Option<Worker>>,
}

impl CpalAudioSink {
    /// Create a sink for the default output device.
    ///
    /// # Errors
    /// Returns an error if the host has no output device.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| BridgeError::NotAvailable("No default output device found".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using default audio device: {}", name);

        Ok(Self {
            worker: Mutex::new(None),
        })
    }

    fn control_loop(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
        let device = match cpal::default_host().default_output_device() {
            Some(device) => device,
            None => {
                error!("Audio device disappeared before playback started");
                return;
            }
        };

        let mut stream: Option<Stream> = None;

        while !stop.load(Ordering::Acquire) {
            if shared.finished.load(Ordering::Acquire) {
                debug!("Source finished, releasing audio stream");
                break;
            }

            let next_format = if stream.is_none() {
                match shared.source.lock().read(&mut []) {
                    PcmPull::FormatChange(format) => Some(format),
                    PcmPull::Finished => {
                        debug!("Source finished before producing audio");
                        break;
                    }
                    PcmPull::Samples(_) | PcmPull::Starved => None,
                }
            } else {
                shared.pending_format.lock().take()
            };

            if let Some(format) = next_format {
                // Drop the old stream before opening the new one.
                stream = None;
                match Self::open_stream(&device, format, Arc::clone(&shared)) {
                    Ok(s) => {
                        shared.halted.store(false, Ordering::Release);
                        stream = Some(s);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to open audio stream, releasing source");
                        break;
                    }
                }
            }

            thread::sleep(CONTROL_TICK);
        }

        drop(stream);
    }

    /// Pick a device configuration that plays `format` as is.
    ///
    /// Prefers the device's default sample format, then i16, then f32.
    fn choose_config(device: &Device, format: PcmFormat) -> Result<(StreamConfig, SampleFormat)> {
        let preferred = device
            .default_output_config()
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::F32);
        let rank = |sample_format: SampleFormat| match sample_format {
            f if f == preferred => 0,
            SampleFormat::I16 => 1,
            _ => 2,
        };

        let rate = cpal::SampleRate(format.sample_rate);
        let supported = device
            .supported_output_configs()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to get device configs: {}", e)))?
            .filter(|c| {
                c.channels() == format.channels
                    && c.min_sample_rate() <= rate
                    && c.max_sample_rate() >= rate
                    && matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32)
            })
            .min_by_key(|c| rank(c.sample_format()))
            .ok_or_else(|| {
                BridgeError::NotAvailable(format!(
                    "Output device cannot play {} Hz with {} channel(s)",
                    format.sample_rate, format.channels
                ))
            })?;

        let sample_format = supported.sample_format();
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: rate,
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, sample_format))
    }

    fn open_stream(device: &Device, format: PcmFormat, shared: Arc<Shared>) -> Result<Stream> {
        let (config, sample_format) = Self::choose_config(device, format)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let on_error = |err: cpal::StreamError| warn!("Audio stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| shared.fill(data),
                on_error,
                None,
            ),
            _ => {
                let mut scratch: Vec<i16> = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0);
                        shared.fill(&mut scratch);
                        for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                            *out = *sample as f32 / 32768.0;
                        }
                    },
                    on_error,
                    None,
                )
            }
        }
        .map_err(|e| BridgeError::OperationFailed(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to start stream: {}", e)))?;

        Ok(stream)
    }

    async fn halt_worker(&self) -> Result<()> {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Release);
            core_async::task::spawn_blocking(move || worker.handle.join())
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))?
                .map_err(|_| BridgeError::OperationFailed("audio thread panicked".to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AudioSink for CpalAudioSink {
    async fn start(&self, source: Box<dyn PcmSource>) -> Result<()> {
        self.halt_worker().await?;

        let shared = Arc::new(Shared {
            source: Mutex::new(source),
            halted: AtomicBool::new(false),
            pending_format: Mutex::new(None),
            finished: AtomicBool::new(false),
        });
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("cpal-audio-sink".to_string())
            .spawn(move || Self::control_loop(shared, thread_stop))
            .map_err(BridgeError::Io)?;

        *self.worker.lock() = Some(Worker { stop, handle });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.halt_worker().await
    }

    async fn close(&self) -> Result<()> {
        self.halt_worker().await
    }
}
