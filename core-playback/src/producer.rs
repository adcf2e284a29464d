//! # Track Producer
//!
//! Background worker that turns the queue into a continuous handoff stream.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          TrackProducer (worker)          │
//! │                                          │
//! │  1. Open session (SourceOpener)          │
//! │  2. Drain and close (ByteSource)         │
//! │  3. Decode on blocking pool              │
//! │  4. Push TrackStart + Chunks             │
//! └────────────┬─────────────────────────────┘
//!              │ Handoff (bounded mpsc)
//!              ▼
//! ┌──────────────────────────────────────────┐
//! │      FrameSource (sink's pull side)      │
//! └──────────────────────────────────────────┘
//! ```
//!
//! While track `i` is being handed over, track `i + 1` is fetched and decoded
//! by a look-ahead task so the next segment is ready at the boundary. The
//! worker observes cancellation at every await point: connection, chunk read,
//! decode completion and each handoff send.

use crate::error::{PlaybackError, Result};
use crate::frames::Handoff;
use crate::traits::{DecodedAudio, SourceOpener, TrackDecoder};
use crate::FormatDetector;
use core_async::sync::{cancellable, mpsc, CancellationToken};
use core_async::task::JoinHandle;
use core_async::time::Duration;
use core_runtime::events::SessionId;
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Collaborators and limits the worker needs for one session.
pub(crate) struct TrackProducer {
    pub(crate) opener: Arc<dyn SourceOpener>,
    pub(crate) decoder: Arc<dyn TrackDecoder>,
    pub(crate) urls: Arc<[String]>,
    pub(crate) http_timeout: Duration,
    pub(crate) chunk_frames: usize,
    pub(crate) prefetch: bool,
    pub(crate) tx: mpsc::Sender<Handoff>,
    pub(crate) cancel: CancellationToken,
}

struct Lookahead {
    index: usize,
    handle: JoinHandle<Result<DecodedAudio>>,
}

impl Lookahead {
    /// Abort the task and wait until it has released its connection.
    async fn discard(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

impl TrackProducer {
    /// Produce tracks `start..` until the queue is exhausted or the session
    /// is cancelled.
    #[instrument(skip(self), fields(tracks = self.urls.len()))]
    pub(crate) async fn run(self, session: SessionId, start: usize) {
        info!("Starting track producer");
        let mut lookahead: Option<Lookahead> = None;

        for index in start..self.urls.len() {
            let fetched = match lookahead.take() {
                Some(mut ahead) if ahead.index == index => {
                    let joined = cancellable(&self.cancel, &mut ahead.handle).await;
                    match joined {
                        Some(joined) => Some(joined.unwrap_or_else(|e| {
                            Err(PlaybackError::Internal(format!("look-ahead task failed: {}", e)))
                        })),
                        None => {
                            ahead.discard().await;
                            None
                        }
                    }
                }
                stale => {
                    if let Some(ahead) = stale {
                        ahead.discard().await;
                    }
                    cancellable(&self.cancel, self.fetch(index)).await
                }
            };

            let Some(result) = fetched else {
                info!("Track producer cancelled");
                return;
            };

            if self.prefetch && index + 1 < self.urls.len() {
                lookahead = Some(self.spawn_lookahead(index + 1));
            }

            let delivered = match result {
                Ok(audio) => self.deliver(index, audio).await,
                Err(e) => {
                    warn!(track_index = index, error = %e, "Skipping track");
                    self.send(Handoff::TrackFailed {
                        index,
                        message: format!("Unable to play track {}: {}", index + 1, e),
                    })
                    .await
                }
            };

            if !delivered {
                if let Some(ahead) = lookahead.take() {
                    ahead.discard().await;
                }
                if self.cancel.is_cancelled() {
                    info!("Track producer cancelled");
                } else {
                    warn!(track_index = index, "Audio sink released the handoff, stopping producer");
                }
                return;
            }
        }

        if self.send(Handoff::EndOfShow).await {
            info!("All tracks handed off");
        }
    }

    fn spawn_lookahead(&self, index: usize) -> Lookahead {
        let cancel = self.cancel.child_token();
        let opener = Arc::clone(&self.opener);
        let decoder = Arc::clone(&self.decoder);
        let url = self.urls[index].clone();
        let timeout = self.http_timeout;

        debug!(track_index = index, "Prefetching next track");
        let handle = core_async::spawn(async move {
            cancellable(&cancel, fetch_track(opener, decoder, url, timeout))
                .await
                .unwrap_or_else(|| Err(PlaybackError::Internal("look-ahead cancelled".to_string())))
        });

        Lookahead { index, handle }
    }

    async fn fetch(&self, index: usize) -> Result<DecodedAudio> {
        fetch_track(
            Arc::clone(&self.opener),
            Arc::clone(&self.decoder),
            self.urls[index].clone(),
            self.http_timeout,
        )
        .await
    }

    async fn deliver(&self, index: usize, audio: DecodedAudio) -> bool {
        let format = audio.format();
        debug!(
            track_index = index,
            frames = audio.frames(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Delivering track"
        );

        if !self.send(Handoff::TrackStart { index, format }).await {
            return false;
        }

        let step = self.chunk_frames.max(1) * usize::from(format.channels.max(1));
        let total = audio.samples.len();
        let mut offset = 0;
        while offset < total {
            let end = (offset + step).min(total);
            let chunk = Handoff::Chunk {
                samples: Arc::clone(&audio.samples),
                range: offset..end,
            };
            if !self.send(chunk).await {
                return false;
            }
            offset = end;
        }
        true
    }

    /// Push one message, returning `false` once the session is cancelled or
    /// the frame source is gone.
    async fn send(&self, message: Handoff) -> bool {
        matches!(
            cancellable(&self.cancel, self.tx.send(message)).await,
            Some(Ok(()))
        )
    }
}

/// Open, drain, close and decode one track.
async fn fetch_track(
    opener: Arc<dyn SourceOpener>,
    decoder: Arc<dyn TrackDecoder>,
    url: String,
    timeout: Duration,
) -> Result<DecodedAudio> {
    let mut source = opener.open(&url, timeout).await?;
    let body = source.read_all().await;
    source.close().await;
    let bytes = body?;

    debug!(url = %redact_url(&url), bytes = bytes.len(), "Track downloaded");

    let hint = FormatDetector::extension_from_url(&url);
    core_async::task::spawn_blocking(move || decoder.decode(bytes, hint.as_deref()))
        .await
        .map_err(|e| PlaybackError::Internal(format!("decode task failed: {}", e)))?
}
