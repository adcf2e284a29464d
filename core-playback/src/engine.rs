//! # Gapless Engine
//!
//! Control core of the player. Owns the queue, the shared status and the
//! background worker for the current play session, and exposes transport
//! controls to the host.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──load──▶ Loaded ──play──▶ Playing ◀──play/pause──▶ Paused
//!                  ▲                 │                        │
//!                  │               stop / end of show       stop
//!                  │                 ▼                        │
//!                  └────load──── Stopped ◀────────────────────┘
//! ```
//!
//! ## Sessions
//!
//! Every `play()` from `Loaded`/`Stopped` starts a new session. `stop()`,
//! `jump_to_track()` and `load_*()` supersede the running one before they
//! return: the worker is cancelled and awaited, the sink is stopped, and
//! events tagged with the old [`SessionId`] are no longer published.
//! [`GaplessEngine::subscribe`] additionally drops anything still buffered
//! from a superseded session.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bridge_desktop::{NullAudioSink, ReqwestHttpClient};
//! use core_playback::{EngineConfig, GaplessEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_playback::Result<()> {
//! let engine = GaplessEngine::new(
//!     Arc::new(ReqwestHttpClient::new()),
//!     Arc::new(NullAudioSink::new()),
//!     EngineConfig::default(),
//! )?;
//!
//! let mut events = engine.subscribe();
//! engine
//!     .load_urls(vec!["https://example.org/d1t01.mp3".to_string()])
//!     .await?;
//! engine.play().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.description());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::decoder::SymphoniaDecoder;
use crate::error::{PlaybackError, Result};
use crate::frames::FrameSource;
use crate::producer::TrackProducer;
use crate::queue::PlaybackQueue;
use crate::show::{ShowData, TrackDescriptor};
use crate::source::HttpSourceOpener;
use crate::state::{PlaybackState, SharedStatus, StatusSnapshot};
use crate::traits::{SourceOpener, TrackDecoder};
use bridge_traits::http::HttpClient;
use bridge_traits::playback::AudioSink;
use core_async::sync::{mpsc, CancellationToken, Mutex};
use core_async::task::JoinHandle;
use core_runtime::events::{EventBus, EventStream, SessionId};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Control {
    queue: PlaybackQueue,
    show: Option<Arc<ShowData>>,
    worker: Option<Worker>,
}

/// Gapless streaming playback engine.
///
/// Control calls are serialized by an async lock and never wait on network
/// or decode latency; the only thing they await is a cancelled worker
/// winding down, which happens within one chunk read or one decode.
pub struct GaplessEngine {
    config: EngineConfig,
    opener: Arc<dyn SourceOpener>,
    decoder: Arc<dyn TrackDecoder>,
    sink: Arc<dyn AudioSink>,
    events: EventBus,
    status: Arc<SharedStatus>,
    control: Mutex<Control>,
}

impl GaplessEngine {
    /// Create an engine that fetches over `http` and renders to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        http: Arc<dyn HttpClient>,
        sink: Arc<dyn AudioSink>,
        config: EngineConfig,
    ) -> Result<Self> {
        let opener = Arc::new(HttpSourceOpener::new(http, config.read_chunk_bytes));
        Self::with_components(opener, Arc::new(SymphoniaDecoder::new()), sink, config)
    }

    /// Create an engine from explicit collaborators.
    pub fn with_components(
        opener: Arc<dyn SourceOpener>,
        decoder: Arc<dyn TrackDecoder>,
        sink: Arc<dyn AudioSink>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let events = EventBus::default();
        Ok(Self {
            config,
            opener,
            decoder,
            sink,
            status: Arc::new(SharedStatus::new(events.clone())),
            events,
            control: Mutex::new(Control {
                queue: PlaybackQueue::new(),
                show: None,
                worker: None,
            }),
        })
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load a show, replacing the queue and superseding any prior session.
    pub async fn load_show(&self, show: &ShowData) -> Result<()> {
        let mut control = self.control.lock().await;
        self.load_locked(&mut control, show.urls()).await?;
        control.show = Some(Arc::new(show.clone()));
        info!(
            tracks = show.tracks.len(),
            date = show.date.as_deref().unwrap_or("unknown"),
            "Show loaded"
        );
        Ok(())
    }

    /// Load bare track URLs.
    pub async fn load_urls(&self, urls: Vec<String>) -> Result<()> {
        let mut control = self.control.lock().await;
        let count = urls.len();
        self.load_locked(&mut control, urls).await?;
        control.show = None;
        info!(tracks = count, "Queue loaded");
        Ok(())
    }

    async fn load_locked(&self, control: &mut Control, urls: Vec<String>) -> Result<()> {
        if urls.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        self.halt_locked(control, PlaybackState::Loaded).await?;
        control.queue.load(urls)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start or resume playback.
    ///
    /// From `Loaded`/`Stopped` a new session starts at the current index;
    /// from `Paused` output resumes without re-fetching. No-op if already
    /// playing.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::NoShowLoaded`] before any load, and
    /// [`PlaybackError::AudioDevice`] if the sink refuses to start.
    pub async fn play(&self) -> Result<()> {
        let mut control = self.control.lock().await;
        self.play_locked(&mut control).await
    }

    async fn play_locked(&self, control: &mut Control) -> Result<()> {
        let resumed = self.status.update(|status| match status.state {
            PlaybackState::Paused => {
                status.state = PlaybackState::Playing;
                Some(true)
            }
            PlaybackState::Playing => Some(false),
            _ => None,
        });
        match resumed {
            Some(true) => {
                info!("Playback resumed");
                return Ok(());
            }
            Some(false) => return Ok(()),
            None => {}
        }

        if !control.queue.is_loaded() {
            return Err(PlaybackError::NoShowLoaded);
        }
        self.start_session_locked(control, PlaybackState::Playing).await
    }

    /// Start a worker and attach a fresh frame source at the current index.
    async fn start_session_locked(&self, control: &mut Control, initial: PlaybackState) -> Result<()> {
        self.retire_worker(control).await;

        let start = self.status.snapshot().track_index;
        control.queue.set_current_index(start)?;
        let session = self.status.begin_session(initial, start);

        let (tx, rx) = mpsc::channel(self.config.handoff_capacity_chunks);
        let source = FrameSource::new(
            rx,
            Arc::clone(&self.status),
            session,
            self.config.position_interval,
        );

        if let Err(e) = self.sink.start(Box::new(source)).await {
            warn!(error = %e, "Audio sink failed to start");
            self.status.begin_session(PlaybackState::Stopped, 0);
            return Err(e.into());
        }

        let cancel = CancellationToken::new();
        let producer = TrackProducer {
            opener: Arc::clone(&self.opener),
            decoder: Arc::clone(&self.decoder),
            urls: control.queue.urls().into(),
            http_timeout: self.config.http_timeout,
            chunk_frames: self.config.delivery_chunk_frames,
            prefetch: self.config.prefetch_next_track,
            tx,
            cancel: cancel.clone(),
        };
        let handle = core_async::spawn(producer.run(session, start));
        control.worker = Some(Worker { cancel, handle });

        info!(session = %session, track_index = start, state = ?initial, "Play session started");
        Ok(())
    }

    /// Stop forwarding frames to the sink. No-op unless playing.
    ///
    /// The worker keeps fetching until the handoff is full.
    pub fn pause(&self) {
        let paused = self.status.update(|status| {
            if status.state == PlaybackState::Playing {
                status.state = PlaybackState::Paused;
                true
            } else {
                false
            }
        });
        if paused {
            info!("Playback paused");
        }
    }

    /// Terminate the session and reset to track 0, position 0.
    ///
    /// When this returns the worker has exited, every session it held is
    /// closed and no event from the superseded session will be published.
    /// No-op when already stopped: a worker left over from a finished show is
    /// reaped without starting a new session.
    pub async fn stop(&self) -> Result<()> {
        let mut control = self.control.lock().await;
        if self.status.state() == PlaybackState::Stopped {
            self.retire_worker(&mut control).await;
            return Ok(());
        }
        self.halt_locked(&mut control, PlaybackState::Stopped).await?;
        info!("Playback stopped");
        Ok(())
    }

    async fn halt_locked(&self, control: &mut Control, next: PlaybackState) -> Result<()> {
        let session = self.status.begin_session(next, 0);
        debug!(session = %session, ?next, "Superseding play session");
        if control.queue.is_loaded() {
            control.queue.set_current_index(0)?;
        }
        self.retire_worker(control).await;
        self.sink.stop().await?;
        Ok(())
    }

    async fn retire_worker(&self, control: &mut Control) {
        if let Some(worker) = control.worker.take() {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                warn!(error = %e, "Track producer did not exit cleanly");
            }
        }
    }

    /// Make track `index` current.
    ///
    /// While playing, the running session is stopped and a new one starts at
    /// `index`, so the next track-changed event names `index`. While paused,
    /// the buffered frames of the old track are discarded and a new session
    /// is prepared at `index` but held paused; the next `play()` resumes into
    /// it. A jump never unpauses on its own. Otherwise only the index changes.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::NoShowLoaded`] before any load and
    /// [`PlaybackError::IndexOutOfRange`] for an invalid index.
    #[instrument(skip(self))]
    pub async fn jump_to_track(&self, index: usize) -> Result<()> {
        let mut control = self.control.lock().await;
        if !control.queue.is_loaded() {
            return Err(PlaybackError::NoShowLoaded);
        }
        control.queue.url_at(index)?;

        match self.status.state() {
            PlaybackState::Playing => {
                self.halt_locked(&mut control, PlaybackState::Stopped).await?;
                self.set_index_locked(&mut control, index)?;
                self.play_locked(&mut control).await
            }
            PlaybackState::Paused => {
                self.halt_locked(&mut control, PlaybackState::Stopped).await?;
                self.set_index_locked(&mut control, index)?;
                self.start_session_locked(&mut control, PlaybackState::Paused).await
            }
            _ => self.set_index_locked(&mut control, index),
        }
    }

    fn set_index_locked(&self, control: &mut Control, index: usize) -> Result<()> {
        control.queue.set_current_index(index)?;
        self.status.update(|status| {
            status.track_index = index;
            status.position_secs = 0.0;
        });
        debug!(track_index = index, "Current track set");
        Ok(())
    }

    /// Streams are forward-only; always fails.
    pub fn seek(&self, _position_secs: f64) -> Result<()> {
        Err(PlaybackError::UnsupportedOperation("seek within a streamed track"))
    }

    /// Stop playback and release the sink's device resources.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop().await?;
        self.sink.close().await?;
        info!("Engine shut down");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Seconds into the current track.
    pub fn position(&self) -> f64 {
        self.status.snapshot().position_secs
    }

    pub fn current_track_index(&self) -> usize {
        self.status.snapshot().track_index
    }

    pub fn state(&self) -> PlaybackState {
        self.status.state()
    }

    /// State, session, index and position read under one lock.
    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn session(&self) -> SessionId {
        self.status.session()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    /// Descriptor of the current track when a show (not bare URLs) is loaded.
    pub async fn current_track(&self) -> Option<TrackDescriptor> {
        let show = self.control.lock().await.show.clone()?;
        show.tracks.get(self.current_track_index()).cloned()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Events from the current play session only.
    ///
    /// Events still buffered when a session is superseded are dropped at
    /// delivery.
    pub fn subscribe(&self) -> EventStream {
        let status = Arc::clone(&self.status);
        EventStream::new(self.events.subscribe())
            .filter(move |event| event.session == status.session())
    }

    /// Underlying bus, including events from superseded sessions.
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }
}

impl Drop for GaplessEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.control.get_mut().worker.take() {
            worker.cancel.cancel();
        }
    }
}
