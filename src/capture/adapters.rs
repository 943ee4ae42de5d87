//! Sample source adapters
//!
//! Convert the buffers handed over by capture producers into `MediaSample`s
//! and post them to the matching track of the active writer. Posting never
//! blocks: a track that is not ready drops the sample.

use super::clock::MediaClock;
use super::traits::{CapturedAudio, CapturedFrame, MediaSample, TrackKind};
use crate::muxer::{IngestOutcome, TrackWriter};
use std::sync::Arc;

/// Posts samples for one track into the writer
#[derive(Clone)]
pub struct SampleSink {
    kind: TrackKind,
    writer: Arc<TrackWriter>,
}

impl SampleSink {
    pub fn new(kind: TrackKind, writer: Arc<TrackWriter>) -> Self {
        Self { kind, writer }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn post(&self, pts_us: i64, payload: Vec<u8>) -> IngestOutcome {
        self.writer.ingest(MediaSample::new(self.kind, pts_us, payload))
    }
}

/// Entry point for a screen source: video frames plus the system audio
/// bundled with them
#[derive(Clone)]
pub struct ScreenSampleAdapter {
    clock: MediaClock,
    video: SampleSink,
    system_audio: SampleSink,
}

impl ScreenSampleAdapter {
    pub fn new(clock: MediaClock, writer: Arc<TrackWriter>) -> Self {
        Self {
            clock,
            video: SampleSink::new(TrackKind::Video, writer.clone()),
            system_audio: SampleSink::new(TrackKind::SystemAudio, writer),
        }
    }

    /// Clock the source must stamp its buffers with
    pub fn clock(&self) -> MediaClock {
        self.clock
    }

    pub fn on_video_frame(&self, frame: CapturedFrame) -> IngestOutcome {
        self.video.post(frame.timestamp_us, frame.data)
    }

    pub fn on_system_audio(&self, audio: CapturedAudio) -> IngestOutcome {
        self.system_audio.post(audio.timestamp_us, audio.data)
    }
}
