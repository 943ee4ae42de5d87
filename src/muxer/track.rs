//! Per-track input state
//!
//! A track input is the only path into the container for one media stream.
//! It owns the producer end of a bounded queue drained by the writer worker;
//! a full queue means the track is not ready for more data.

use crate::capture::traits::{MediaSample, TrackKind};
use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a single track input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackState {
    /// No sample accepted yet
    NotStarted,
    /// At least one sample accepted
    Started,
    /// Marked finished, accepts nothing
    Finished,
}

/// Why a sample was not appended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The writer has not received its anchoring video sample yet
    NotWriting,
    /// `finish()` was requested or the writer failed
    WriterClosed,
    /// The session was started without this track
    NoSuchTrack,
    /// The track input was marked finished
    TrackFinished,
    /// Timestamp precedes the session start-time anchor
    BeforeAnchor,
    /// The track's queue is full
    NotReady,
}

/// Result of an ingest call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Appended,
    Dropped(DropReason),
}

impl IngestOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, IngestOutcome::Appended)
    }
}

/// Producer side of one track
pub(crate) struct TrackInput {
    kind: TrackKind,
    state: TrackState,
    sender: Option<Sender<MediaSample>>,
    appended: u64,
}

impl TrackInput {
    pub(crate) fn new(kind: TrackKind, sender: Sender<MediaSample>) -> Self {
        Self {
            kind,
            state: TrackState::NotStarted,
            sender: Some(sender),
            appended: 0,
        }
    }

    pub(crate) fn state(&self) -> TrackState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn appended(&self) -> u64 {
        self.appended
    }

    /// Non-blocking append. The caller holds the writer gate.
    pub(crate) fn try_append(&mut self, sample: MediaSample) -> IngestOutcome {
        if self.state == TrackState::Finished {
            return IngestOutcome::Dropped(DropReason::TrackFinished);
        }

        let Some(sender) = self.sender.as_ref() else {
            return IngestOutcome::Dropped(DropReason::WriterClosed);
        };

        match sender.try_send(sample) {
            Ok(()) => {
                if self.state == TrackState::NotStarted {
                    tracing::debug!("Track {} started", self.kind);
                    self.state = TrackState::Started;
                }
                self.appended += 1;
                IngestOutcome::Appended
            }
            Err(TrySendError::Full(_)) => IngestOutcome::Dropped(DropReason::NotReady),
            Err(TrySendError::Disconnected(_)) => IngestOutcome::Dropped(DropReason::WriterClosed),
        }
    }

    /// Mark finished and close the queue so the worker can drain it
    pub(crate) fn finish(&mut self) {
        if self.state != TrackState::Finished {
            tracing::debug!("Track {} finished after {} samples", self.kind, self.appended);
        }
        self.state = TrackState::Finished;
        self.sender = None;
    }
}

/// Per-track drop counters, readable without taking the writer gate
#[derive(Debug, Default)]
pub(crate) struct DropCounters {
    counts: [AtomicU64; 3],
}

impl DropCounters {
    pub(crate) fn record(&self, kind: TrackKind, reason: DropReason) {
        let total = self.counts[kind.index()].fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!("Dropped {} sample ({:?}), {} dropped so far", kind, reason, total);
    }

    pub(crate) fn get(&self, kind: TrackKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_full_queue_reports_not_ready() {
        let (tx, rx) = bounded(1);
        let mut input = TrackInput::new(TrackKind::Video, tx);

        assert_eq!(input.try_append(MediaSample::video(0, vec![1])), IngestOutcome::Appended);
        assert_eq!(input.state(), TrackState::Started);
        assert_eq!(
            input.try_append(MediaSample::video(1, vec![2])),
            IngestOutcome::Dropped(DropReason::NotReady)
        );

        rx.recv().unwrap();
        assert!(input.try_append(MediaSample::video(2, vec![3])).is_appended());
        assert_eq!(input.appended(), 2);
    }

    #[test]
    fn test_finished_track_rejects_samples() {
        let (tx, rx) = bounded(4);
        let mut input = TrackInput::new(TrackKind::Microphone, tx);
        input.finish();

        assert_eq!(
            input.try_append(MediaSample::microphone(0, vec![])),
            IngestOutcome::Dropped(DropReason::TrackFinished)
        );
        // The queue is closed once the input is finished
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_drop_counters_are_per_track() {
        let counters = DropCounters::default();
        counters.record(TrackKind::SystemAudio, DropReason::NotWriting);
        counters.record(TrackKind::SystemAudio, DropReason::NotReady);
        assert_eq!(counters.get(TrackKind::SystemAudio), 2);
        assert_eq!(counters.get(TrackKind::Video), 0);
    }
}
