//! # Frame Handoff
//!
//! Bounded producer/consumer channel between the background worker and the
//! audio sink. The worker pushes [`Handoff`] messages; the sink pulls PCM
//! through [`FrameSource`], which also owns all observer notifications for
//! track starts, position, failures and completion. Because the sink drives
//! those notifications, a track is only reported once its first frame is
//! handed over, and position updates for a track always precede the next
//! track's start.

use crate::state::{PlaybackState, SharedStatus};
use bridge_traits::playback::{PcmFormat, PcmPull, PcmSource};
use core_async::sync::mpsc::{self, error::TryRecvError};
use core_async::time::{duration_to_frames, frames_to_secs, Duration};
use core_runtime::events::{PlaybackEvent, SessionId};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message from the worker to the frame source.
#[derive(Debug)]
pub(crate) enum Handoff {
    /// Samples that follow belong to track `index` in `format`.
    TrackStart { index: usize, format: PcmFormat },
    /// A slice of the current track's decoded samples.
    Chunk {
        samples: Arc<[i16]>,
        range: Range<usize>,
    },
    /// Track `index` could not be played and was skipped.
    TrackFailed { index: usize, message: String },
    /// Every track has been handed over.
    EndOfShow,
}

/// [`PcmSource`] side of the handoff for one play session.
pub(crate) struct FrameSource {
    rx: mpsc::Receiver<Handoff>,
    status: Arc<SharedStatus>,
    session: SessionId,
    position_interval: Duration,
    format: Option<PcmFormat>,
    pending_start: Option<(usize, PcmFormat)>,
    chunk: Option<(Arc<[i16]>, Range<usize>)>,
    track: Option<usize>,
    frames_into_track: u64,
    frames_at_last_report: u64,
    report_every: u64,
    finished: bool,
}

impl FrameSource {
    pub(crate) fn new(
        rx: mpsc::Receiver<Handoff>,
        status: Arc<SharedStatus>,
        session: SessionId,
        position_interval: Duration,
    ) -> Self {
        Self {
            rx,
            status,
            session,
            position_interval,
            format: None,
            pending_start: None,
            chunk: None,
            track: None,
            frames_into_track: 0,
            frames_at_last_report: 0,
            report_every: u64::MAX,
            finished: false,
        }
    }

    fn finish(&mut self) -> PcmPull {
        self.finished = true;
        self.chunk = None;
        self.rx.close();
        PcmPull::Finished
    }

    fn begin_track(&mut self, index: usize, format: PcmFormat) -> bool {
        self.track = Some(index);
        self.frames_into_track = 0;
        self.frames_at_last_report = 0;
        self.report_every = duration_to_frames(self.position_interval, format.sample_rate).max(1);

        let published = self.status.publish(self.session, |status| {
            status.track_index = index;
            status.position_secs = 0.0;
            ((), Some(PlaybackEvent::TrackChanged { track_index: index }))
        });
        if published.is_some() {
            info!(session = %self.session, track_index = index, "Track started");
        }
        published.is_some()
    }

    fn advance_position(&mut self, samples: usize) -> bool {
        let (Some(format), Some(track_index)) = (self.format, self.track) else {
            return true;
        };
        self.frames_into_track += format.frames_in(samples) as u64;
        let position_secs = frames_to_secs(self.frames_into_track, format.sample_rate);

        let report = self.frames_into_track - self.frames_at_last_report >= self.report_every;
        if report {
            self.frames_at_last_report = self.frames_into_track;
        }

        self.status
            .publish(self.session, |status| {
                status.position_secs = position_secs;
                let event = report.then_some(PlaybackEvent::PositionChanged {
                    track_index,
                    position_secs,
                });
                ((), event)
            })
            .is_some()
    }

    fn report_failure(&self, index: usize, message: String) -> bool {
        self.status
            .publish(self.session, |_| ((), Some(PlaybackEvent::Error { track_index: index, message })))
            .is_some()
    }

    fn complete_show(&self) {
        let published = self.status.publish(self.session, |status| {
            status.state = PlaybackState::Stopped;
            status.track_index = 0;
            status.position_secs = 0.0;
            ((), Some(PlaybackEvent::PlaybackFinished))
        });
        if published.is_some() {
            info!(session = %self.session, "Playback finished");
        }
    }
}

impl Drop for FrameSource {
    /// A sink that releases the source before the end of the show leaves
    /// nothing to drain the handoff; the session ends with an error.
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let track = self.track;
        let published = self.status.publish(self.session, |status| {
            let track_index = track.unwrap_or(status.track_index);
            status.state = PlaybackState::Stopped;
            status.position_secs = 0.0;
            let message = "Audio output closed before the end of the show".to_string();
            ((), Some(PlaybackEvent::Error { track_index, message }))
        });
        if published.is_some() {
            warn!(session = %self.session, "Audio sink released the frame source early");
        }
    }
}

impl PcmSource for FrameSource {
    fn read(&mut self, out: &mut [i16]) -> PcmPull {
        if self.finished {
            return PcmPull::Finished;
        }

        let snapshot = self.status.snapshot();
        if snapshot.session != self.session {
            debug!(session = %self.session, "Frame source superseded");
            return self.finish();
        }
        if snapshot.state == PlaybackState::Paused {
            return PcmPull::Starved;
        }

        let mut written = 0;
        loop {
            if let Some((samples, range)) = self.chunk.as_mut() {
                let n = (out.len() - written).min(range.len());
                out[written..written + n].copy_from_slice(&samples[range.start..range.start + n]);
                range.start += n;
                let exhausted = range.is_empty();
                written += n;
                if n > 0 && !self.advance_position(n) {
                    return self.finish();
                }
                if !exhausted {
                    break;
                }
                self.chunk = None;
                if written == out.len() && !out.is_empty() {
                    break;
                }
            }

            if let Some((index, format)) = self.pending_start {
                if self.format != Some(format) {
                    if written > 0 {
                        break;
                    }
                    debug!(sample_rate = format.sample_rate, channels = format.channels, "Announcing format");
                    self.format = Some(format);
                    return PcmPull::FormatChange(format);
                }
                self.pending_start = None;
                if !self.begin_track(index, format) {
                    return self.finish();
                }
                continue;
            }

            match self.rx.try_recv() {
                Ok(Handoff::TrackStart { index, format }) => {
                    self.pending_start = Some((index, format));
                }
                Ok(Handoff::Chunk { samples, range }) => {
                    self.chunk = Some((samples, range));
                }
                Ok(Handoff::TrackFailed { index, message }) => {
                    if !self.report_failure(index, message) {
                        return self.finish();
                    }
                }
                Ok(Handoff::EndOfShow) => {
                    self.complete_show();
                    self.finished = true;
                    self.rx.close();
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!(session = %self.session, "Producer gone without end of show");
                    self.finished = true;
                    break;
                }
            }
        }

        if written > 0 {
            PcmPull::Samples(written)
        } else if self.finished {
            PcmPull::Finished
        } else if out.is_empty() {
            PcmPull::Samples(0)
        } else {
            PcmPull::Starved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::events::{CoreEvent, EventBus};
    use core_async::sync::broadcast;

    fn setup(capacity: usize) -> (mpsc::Sender<Handoff>, FrameSource, Arc<SharedStatus>, broadcast::Receiver<CoreEvent>) {
        let bus = EventBus::default();
        let events = bus.subscribe();
        let status = Arc::new(SharedStatus::new(bus));
        let session = status.begin_session(PlaybackState::Playing, 0);
        let (tx, rx) = mpsc::channel(capacity);
        let source = FrameSource::new(rx, Arc::clone(&status), session, Duration::from_millis(250));
        (tx, source, status, events)
    }

    fn drain(events: &mut broadcast::Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event.event);
        }
        out
    }

    fn chunk(values: &[i16]) -> Handoff {
        let samples: Arc<[i16]> = values.to_vec().into();
        let len = samples.len();
        Handoff::Chunk { samples, range: 0..len }
    }

    #[test]
    fn announces_format_before_first_samples() {
        let (tx, mut source, status, mut events) = setup(8);
        let format = PcmFormat::new(8_000, 2);
        tx.try_send(Handoff::TrackStart { index: 0, format }).unwrap();
        tx.try_send(chunk(&[1, 2, 3, 4])).unwrap();

        assert_eq!(source.read(&mut []), PcmPull::FormatChange(format));
        assert!(drain(&mut events).is_empty());

        let mut out = [0i16; 8];
        assert_eq!(source.read(&mut out), PcmPull::Samples(4));
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
        assert_eq!(drain(&mut events), vec![PlaybackEvent::TrackChanged { track_index: 0 }]);
        assert_eq!(status.snapshot().position_secs, 2.0 / 8_000.0);
    }

    #[test]
    fn empty_read_without_boundary_returns_zero_samples() {
        let (_tx, mut source, _status, _events) = setup(4);
        assert_eq!(source.read(&mut []), PcmPull::Samples(0));
        let mut out = [0i16; 4];
        assert_eq!(source.read(&mut out), PcmPull::Starved);
    }

    #[test]
    fn tracks_with_same_format_are_contiguous() {
        let (tx, mut source, _status, mut events) = setup(8);
        let format = PcmFormat::new(8_000, 1);
        tx.try_send(Handoff::TrackStart { index: 0, format }).unwrap();
        tx.try_send(chunk(&[1, 2])).unwrap();
        tx.try_send(Handoff::TrackStart { index: 1, format }).unwrap();
        tx.try_send(chunk(&[3, 4])).unwrap();
        tx.try_send(Handoff::EndOfShow).unwrap();

        assert_eq!(source.read(&mut []), PcmPull::FormatChange(format));
        let mut out = [0i16; 8];
        assert_eq!(source.read(&mut out), PcmPull::Samples(4));
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
        assert_eq!(source.read(&mut out), PcmPull::Finished);

        assert_eq!(
            drain(&mut events),
            vec![
                PlaybackEvent::TrackChanged { track_index: 0 },
                PlaybackEvent::TrackChanged { track_index: 1 },
                PlaybackEvent::PlaybackFinished,
            ]
        );
    }

    #[test]
    fn format_change_splits_read_at_boundary() {
        let (tx, mut source, _status, _events) = setup(8);
        let first = PcmFormat::new(8_000, 1);
        let second = PcmFormat::new(16_000, 2);
        tx.try_send(Handoff::TrackStart { index: 0, format: first }).unwrap();
        tx.try_send(chunk(&[1, 2])).unwrap();
        tx.try_send(Handoff::TrackStart { index: 1, format: second }).unwrap();
        tx.try_send(chunk(&[5, 6])).unwrap();

        assert_eq!(source.read(&mut []), PcmPull::FormatChange(first));
        let mut out = [0i16; 8];
        assert_eq!(source.read(&mut out), PcmPull::Samples(2));
        assert_eq!(source.read(&mut out), PcmPull::FormatChange(second));
        assert_eq!(source.read(&mut out), PcmPull::Samples(2));
        assert_eq!(&out[..2], &[5, 6]);
    }

    #[test]
    fn failure_is_reported_in_stream_order() {
        let (tx, mut source, status, mut events) = setup(8);
        let format = PcmFormat::new(8_000, 1);
        tx.try_send(Handoff::TrackFailed { index: 0, message: "Unable to play track 1: boom".into() }).unwrap();
        tx.try_send(Handoff::TrackStart { index: 1, format }).unwrap();
        tx.try_send(chunk(&[9])).unwrap();
        tx.try_send(Handoff::EndOfShow).unwrap();

        assert_eq!(source.read(&mut []), PcmPull::FormatChange(format));
        let mut out = [0i16; 4];
        assert_eq!(source.read(&mut out), PcmPull::Samples(1));
        assert_eq!(source.read(&mut out), PcmPull::Finished);

        assert_eq!(
            drain(&mut events),
            vec![
                PlaybackEvent::Error { track_index: 0, message: "Unable to play track 1: boom".into() },
                PlaybackEvent::TrackChanged { track_index: 1 },
                PlaybackEvent::PlaybackFinished,
            ]
        );
        assert_eq!(status.state(), PlaybackState::Stopped);
    }

    #[test]
    fn all_failures_finish_without_format() {
        let (tx, mut source, _status, mut events) = setup(8);
        tx.try_send(Handoff::TrackFailed { index: 0, message: "x".into() }).unwrap();
        tx.try_send(Handoff::EndOfShow).unwrap();

        assert_eq!(source.read(&mut []), PcmPull::Finished);
        assert_eq!(source.read(&mut []), PcmPull::Finished);
        assert_eq!(drain(&mut events).last(), Some(&PlaybackEvent::PlaybackFinished));
    }

    #[test]
    fn paused_source_is_starved() {
        let (tx, mut source, status, _events) = setup(8);
        let format = PcmFormat::new(8_000, 1);
        tx.try_send(Handoff::TrackStart { index: 0, format }).unwrap();
        tx.try_send(chunk(&[1, 2, 3])).unwrap();
        assert_eq!(source.read(&mut []), PcmPull::FormatChange(format));

        status.update(|s| s.state = PlaybackState::Paused);
        let mut out = [0i16; 4];
        assert_eq!(source.read(&mut out), PcmPull::Starved);

        status.update(|s| s.state = PlaybackState::Playing);
        assert_eq!(source.read(&mut out), PcmPull::Samples(3));
    }

    #[test]
    fn superseded_session_finishes_silently() {
        let (tx, mut source, status, mut events) = setup(8);
        tx.try_send(Handoff::TrackStart { index: 0, format: PcmFormat::new(8_000, 1) }).unwrap();

        status.begin_session(PlaybackState::Stopped, 0);

        assert_eq!(source.read(&mut []), PcmPull::Finished);
        assert!(drain(&mut events).is_empty());
        assert!(tx.try_send(Handoff::EndOfShow).is_err());
    }

    #[test]
    fn released_source_ends_session_with_error() {
        let (tx, mut source, status, mut events) = setup(8);
        let format = PcmFormat::new(8_000, 1);
        tx.try_send(Handoff::TrackStart { index: 2, format }).unwrap();
        tx.try_send(chunk(&[1, 2])).unwrap();
        assert_eq!(source.read(&mut []), PcmPull::FormatChange(format));
        let mut out = [0i16; 1];
        assert_eq!(source.read(&mut out), PcmPull::Samples(1));
        drain(&mut events);

        drop(source);

        let after = drain(&mut events);
        assert_eq!(after.len(), 1);
        assert!(matches!(after[0], PlaybackEvent::Error { track_index: 2, .. }));
        assert_eq!(status.state(), PlaybackState::Stopped);
        assert!(tx.try_send(chunk(&[3])).is_err());
    }

    #[test]
    fn finished_source_drops_quietly() {
        let (tx, mut source, status, mut events) = setup(8);
        tx.try_send(Handoff::EndOfShow).unwrap();
        assert_eq!(source.read(&mut []), PcmPull::Finished);
        drain(&mut events);

        drop(source);

        assert!(drain(&mut events).is_empty());
        assert_eq!(status.state(), PlaybackState::Stopped);
    }

    #[test]
    fn position_reports_are_throttled() {
        let (tx, mut source, _status, mut events) = setup(64);
        let format = PcmFormat::new(1_000, 1);
        tx.try_send(Handoff::TrackStart { index: 0, format }).unwrap();
        // 1000 frames at 1 kHz = 1 s; 250 ms interval gives four reports.
        for _ in 0..10 {
            tx.try_send(chunk(&[0; 100])).unwrap();
        }

        assert_eq!(source.read(&mut []), PcmPull::FormatChange(format));
        let mut out = [0i16; 50];
        while let PcmPull::Samples(n) = source.read(&mut out) {
            if n == 0 {
                break;
            }
        }

        let positions: Vec<f64> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                PlaybackEvent::PositionChanged { position_secs, .. } => Some(position_secs),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![0.25, 0.5, 0.75, 1.0]);
    }
}
