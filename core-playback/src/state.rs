//! # Playback State
//!
//! Transport state, current track and position live in one struct behind a
//! single lock together with the play-session identifier. Events are
//! published while that lock is held, so a session bump made by `stop()`
//! cannot interleave with an event from the run it supersedes.

use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, SessionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Transport state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing loaded yet.
    Idle,
    /// A queue is loaded and playback has not started.
    Loaded,
    Playing,
    Paused,
    /// Stopped explicitly or after the last track finished.
    Stopped,
}

/// Consistent view of the playback status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    pub state: PlaybackState,
    pub session: SessionId,
    pub track_index: usize,
    pub position_secs: f64,
}

/// Lock-protected status shared by the engine and the frame source.
pub(crate) struct SharedStatus {
    inner: Mutex<StatusSnapshot>,
    events: EventBus,
}

impl SharedStatus {
    pub(crate) fn new(events: EventBus) -> Self {
        Self {
            inner: Mutex::new(StatusSnapshot {
                state: PlaybackState::Idle,
                session: SessionId::new(0),
                track_index: 0,
                position_secs: 0.0,
            }),
            events,
        }
    }

    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        *self.inner.lock()
    }

    pub(crate) fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    pub(crate) fn session(&self) -> SessionId {
        self.inner.lock().session
    }

    /// Start a new session in `state` at `track_index`, position 0.
    ///
    /// Any frame source still holding the previous session goes stale.
    pub(crate) fn begin_session(&self, state: PlaybackState, track_index: usize) -> SessionId {
        let mut status = self.inner.lock();
        status.session = status.session.next();
        status.state = state;
        status.track_index = track_index;
        status.position_secs = 0.0;
        trace!(session = %status.session, ?state, track_index, "Session started");
        status.session
    }

    /// Mutate the status without touching the session.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut StatusSnapshot) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Run `f` only if `session` is still current, publishing the event it
    /// returns before the lock is released.
    ///
    /// Returns `None` when the session is stale.
    pub(crate) fn publish<R>(
        &self,
        session: SessionId,
        f: impl FnOnce(&mut StatusSnapshot) -> (R, Option<PlaybackEvent>),
    ) -> Option<R> {
        let mut status = self.inner.lock();
        if status.session != session {
            return None;
        }
        let (result, event) = f(&mut status);
        if let Some(event) = event {
            // No subscribers is not an error.
            let _ = self.events.emit(CoreEvent::new(session, event));
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let status = SharedStatus::new(EventBus::default());
        let snap = status.snapshot();
        assert_eq!(snap.state, PlaybackState::Idle);
        assert_eq!(snap.track_index, 0);
        assert_eq!(snap.position_secs, 0.0);
    }

    #[test]
    fn begin_session_is_monotonic() {
        let status = SharedStatus::new(EventBus::default());
        let a = status.begin_session(PlaybackState::Loaded, 0);
        let b = status.begin_session(PlaybackState::Playing, 3);
        assert!(b > a);
        assert_eq!(status.snapshot().track_index, 3);
        assert_eq!(status.state(), PlaybackState::Playing);
    }

    #[test]
    fn stale_session_publishes_nothing() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let status = SharedStatus::new(bus);

        let old = status.begin_session(PlaybackState::Playing, 0);
        status.begin_session(PlaybackState::Stopped, 0);

        let applied = status.publish(old, |s| {
            s.track_index = 4;
            ((), Some(PlaybackEvent::TrackChanged { track_index: 4 }))
        });

        assert!(applied.is_none());
        assert_eq!(status.snapshot().track_index, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn current_session_publishes_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let status = SharedStatus::new(bus);

        let session = status.begin_session(PlaybackState::Playing, 0);
        status.publish(session, |s| {
            s.track_index = 1;
            ((), Some(PlaybackEvent::TrackChanged { track_index: 1 }))
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session, session);
        assert_eq!(event.event, PlaybackEvent::TrackChanged { track_index: 1 });
    }
}
