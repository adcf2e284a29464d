//! # Event Bus System
//!
//! Broadcasts playback notifications from the engine worker to any number of
//! observers using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`PlaybackEvent`] wrapped in a [`CoreEvent`] envelope that
//!   carries the [`SessionId`] of the play run that produced it
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Engine worker ├──────────────>│ EventBus  ├─────────────────>│ Subscriber │
//! └───────────────┘               │ (broadcast│                  └────────────┘
//!                                 │  channel) │     subscribe    ┌────────────┐
//!                                 │           ├─────────────────>│ Subscriber │
//!                                 └───────────┘                  └────────────┘
//! ```
//!
//! ## Sessions
//!
//! Every `play()` after a stop or jump starts a new session. A subscriber that
//! only cares about the live run filters on the session it was handed:
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent, SessionId};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let live = SessionId::new(2);
//! let mut stream = EventStream::new(bus.subscribe()).filter(move |e| e.session == live);
//!
//! bus.emit(CoreEvent::new(SessionId::new(1), PlaybackEvent::PlaybackFinished)).ok();
//! bus.emit(CoreEvent::new(live, PlaybackEvent::TrackChanged { track_index: 0 })).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.event, PlaybackEvent::TrackChanged { track_index: 0 });
//! # }
//! ```

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Identifier of one uninterrupted play run.
///
/// Strictly increasing for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// The identifier following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Envelope published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreEvent {
    /// Play run that produced this event.
    pub session: SessionId,
    #[serde(flatten)]
    pub event: PlaybackEvent,
}

impl CoreEvent {
    pub fn new(session: SessionId, event: PlaybackEvent) -> Self {
        Self { session, event }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        self.event.description()
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Notifications emitted while a show plays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The first frame of a track reached the sink.
    TrackChanged {
        /// 0-based queue index.
        track_index: usize,
    },
    /// Seconds of the current track consumed by the sink.
    PositionChanged {
        track_index: usize,
        position_secs: f64,
    },
    /// The last track in the queue was consumed. Sent once per session.
    PlaybackFinished,
    /// A track was skipped because it could not be fetched or decoded.
    Error {
        /// 0-based queue index of the skipped track.
        track_index: usize,
        /// Human-readable error message.
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Track changed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::PlaybackFinished => "Playback finished",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }

    /// Queue index the event refers to, if any.
    pub fn track_index(&self) -> Option<usize> {
        match self {
            PlaybackEvent::TrackChanged { track_index }
            | PlaybackEvent::PositionChanged { track_index, .. }
            | PlaybackEvent::Error { track_index, .. } => Some(*track_index),
            PlaybackEvent::PlaybackFinished => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(session: u64, track_index: usize) -> CoreEvent {
        CoreEvent::new(SessionId::new(session), PlaybackEvent::TrackChanged { track_index })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(changed(1, 0)).is_err());
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(changed(1, 3)).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), changed(1, 3));
        assert_eq!(sub2.recv().await.unwrap(), changed(1, 3));
    }

    #[tokio::test]
    async fn test_stream_filter_drops_stale_sessions() {
        let bus = EventBus::new(10);
        let live = SessionId::new(5);
        let mut stream = EventStream::new(bus.subscribe()).filter(move |e| e.session == live);

        bus.emit(changed(4, 0)).unwrap();
        bus.emit(changed(4, 1)).unwrap();
        bus.emit(changed(5, 2)).unwrap();

        assert_eq!(stream.recv().await.unwrap(), changed(5, 2));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_try_recv_reports_lag() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for i in 0..5 {
            bus.emit(changed(1, i)).unwrap();
        }

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());
        drop(bus);

        assert!(matches!(stream.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn test_session_ordering() {
        let first = SessionId::new(1);
        assert!(first.next() > first);
        assert_eq!(first.next().value(), 2);
        assert_eq!(first.to_string(), "#1");
    }

    #[test]
    fn test_event_description() {
        let error = CoreEvent::new(
            SessionId::new(1),
            PlaybackEvent::Error {
                track_index: 2,
                message: "Unable to play track 3: no data received".to_string(),
            },
        );
        assert_eq!(error.description(), "Playback error");
        assert_eq!(error.event.track_index(), Some(2));

        let finished = CoreEvent::new(SessionId::new(1), PlaybackEvent::PlaybackFinished);
        assert_eq!(finished.event.track_index(), None);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::new(
            SessionId::new(7),
            PlaybackEvent::PositionChanged {
                track_index: 1,
                position_secs: 1.5,
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["session"], 7);
        assert_eq!(json["event"], "PositionChanged");
        assert_eq!(json["track_index"], 1);
        assert_eq!(json["position_secs"], 1.5);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
