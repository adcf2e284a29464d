//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::NullAudioSink;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpStream};
use bridge_traits::playback::AudioSink;
use bytes::Bytes;
use core_playback::{EngineConfig, EventStream, GaplessEngine, PlaybackEvent};
use mockall::mock;
use std::collections::HashMap;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn download_stream(&self, request: HttpRequest) -> BridgeResult<HttpStream>;
    }
}

/// What the mock server answers for a URL.
#[derive(Clone)]
pub enum Route {
    Body(Bytes),
    Status(u16),
    Stall,
}

/// Body that never produces a byte. `open` counts live instances.
struct Stalled {
    open: Arc<AtomicUsize>,
}

impl Stalled {
    fn new(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            open: Arc::clone(open),
        }
    }
}

impl Drop for Stalled {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AsyncRead for Stalled {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Pending
    }
}

/// 16-bit WAV of `frames` frames at `sample_rate`, every sample set to `value`.
pub fn wav(sample_rate: u32, channels: u16, frames: usize, value: i16) -> Bytes {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames * channels as usize {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}

pub fn url(name: &str) -> String {
    format!("http://archive.test/show/{name}.wav")
}

/// Mock client answering `download_stream` from `routes`; unknown URLs are
/// refused.
pub fn http_client(routes: Vec<(String, Route)>) -> Arc<MockHttp> {
    http_client_tracking_stalls(routes).0
}

/// Like [`http_client`], also returning the number of stalled bodies still
/// held open by the engine.
pub fn http_client_tracking_stalls(routes: Vec<(String, Route)>) -> (Arc<MockHttp>, Arc<AtomicUsize>) {
    let routes: HashMap<String, Route> = routes.into_iter().collect();
    let open = Arc::new(AtomicUsize::new(0));
    let stalls = Arc::clone(&open);
    let mut http = MockHttp::new();
    http.expect_download_stream().returning(move |request| {
        match routes.get(&request.url).cloned() {
            Some(Route::Body(bytes)) => {
                let len = bytes.len() as u64;
                Ok(HttpStream::new(200, Box::new(Cursor::new(bytes))).with_content_length(Some(len)))
            }
            Some(Route::Status(status)) => Err(BridgeError::Status {
                status,
                url: request.url.clone(),
            }),
            Some(Route::Stall) => Ok(HttpStream::new(200, Box::new(Stalled::new(&stalls)))),
            None => Err(BridgeError::OperationFailed("connection refused".to_string())),
        }
    });
    (Arc::new(http), open)
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        http_timeout: Duration::from_millis(300),
        delivery_chunk_frames: 512,
        handoff_capacity_chunks: 4,
        position_interval: Duration::from_millis(50),
        ..EngineConfig::default()
    }
}

pub fn engine(routes: Vec<(String, Route)>, sink: Arc<NullAudioSink>) -> GaplessEngine {
    engine_with_config(routes, sink, test_config())
}

pub fn engine_with_config(
    routes: Vec<(String, Route)>,
    sink: Arc<dyn AudioSink>,
    config: EngineConfig,
) -> GaplessEngine {
    GaplessEngine::new(http_client(routes), sink, config).unwrap()
}

/// Next event other than a position update.
pub async fn next_event(events: &mut EventStream) -> PlaybackEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event bus closed");
        if !matches!(event.event, PlaybackEvent::PositionChanged { .. }) {
            return event.event;
        }
    }
}

/// Every non-position event up to and including `PlaybackFinished`.
pub async fn until_finished(events: &mut EventStream) -> Vec<PlaybackEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = event == PlaybackEvent::PlaybackFinished;
        seen.push(event);
        if done {
            return seen;
        }
    }
}
