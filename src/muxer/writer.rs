//! Track writer
//!
//! Multiplexes the video, system-audio and microphone tracks of one recording
//! into a single container file.
//!
//! All writer state lives behind one gate (a `parking_lot` mutex). The
//! `ingest_*` entry points hold it only for a constant-time check and a
//! non-blocking `try_send` into the track's bounded queue, so capture
//! callbacks never wait on disk I/O or on each other. A single worker thread
//! owns the file and drains the queues.

use super::container::{ContainerFile, ContainerHeader, ContainerTrailer};
use super::track::{DropCounters, DropReason, IngestOutcome, TrackInput, TrackState};
use crate::capture::traits::{MediaSample, TrackKind, VideoQuality};
use crate::utils::error::{RecorderError, RecorderResult};
use crossbeam_channel::{bounded, Receiver, Select};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

/// Writer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriterState {
    /// Container allocated, waiting for the anchoring video sample
    AwaitingFirstSample,
    /// Accepting samples on all configured tracks
    Writing,
    /// `finish()` requested, worker draining
    Finishing,
    /// Trailer written and file synced
    Finalized,
    /// Never started, aborted, or the worker hit an I/O error
    Failed,
}

/// Writer tuning
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// Capacity of each track's queue; a full queue drops samples
    pub queue_capacity: usize,
    pub video_quality: VideoQuality,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            video_quality: VideoQuality::default(),
        }
    }
}

/// Per-track totals reported with a finished recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackReport {
    pub kind: TrackKind,
    pub samples: u64,
    pub dropped: u64,
}

/// A finalized recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewArtifact {
    /// Path of the container file
    pub path: PathBuf,

    /// Time from the anchor to the last sample of any track
    pub duration_ms: f64,

    /// Tracks in container order
    pub tracks: Vec<TrackReport>,
}

impl PreviewArtifact {
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    pub fn track(&self, kind: TrackKind) -> Option<&TrackReport> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}

struct WriterGate {
    state: WriterState,
    anchor_us: Option<i64>,
    inputs: [Option<TrackInput>; 3],
}

struct WriterShared {
    gate: Mutex<WriterGate>,
    drops: DropCounters,
}

type Completion = oneshot::Receiver<io::Result<ContainerTrailer>>;

/// Writer for one recording session
pub struct TrackWriter {
    path: PathBuf,
    tracks: Vec<TrackKind>,
    shared: Arc<WriterShared>,
    completion: Mutex<Option<Completion>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TrackWriter {
    /// Allocate a container at `path` and start the writer worker.
    ///
    /// Video and system audio are always configured; the microphone track
    /// only when `wants_microphone` is set.
    pub fn begin_session(
        path: &Path,
        wants_microphone: bool,
        options: WriterOptions,
    ) -> RecorderResult<Self> {
        let mut tracks = vec![TrackKind::Video, TrackKind::SystemAudio];
        if wants_microphone {
            tracks.push(TrackKind::Microphone);
        }

        let header = ContainerHeader::new(&tracks, options.video_quality);
        let file = ContainerFile::create(path, &header)?;

        let mut inputs: [Option<TrackInput>; 3] = [None, None, None];
        let mut receivers = Vec::with_capacity(tracks.len());
        for kind in &tracks {
            let (tx, rx) = bounded(options.queue_capacity.max(1));
            inputs[kind.index()] = Some(TrackInput::new(*kind, tx));
            receivers.push((*kind, rx));
        }

        let shared = Arc::new(WriterShared {
            gate: Mutex::new(WriterGate {
                state: WriterState::AwaitingFirstSample,
                anchor_us: None,
                inputs,
            }),
            drops: DropCounters::default(),
        });

        let (done_tx, done_rx) = oneshot::channel();
        let worker_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name("track-writer".to_string())
            .spawn(move || run_worker(file, receivers, worker_shared, done_tx))
            .map_err(|e| {
                // The header was written; nothing else will ever use the file
                let _ = std::fs::remove_file(path);
                RecorderError::WriterAllocationFailed(format!("failed to spawn writer: {}", e))
            })?;

        tracing::info!(
            "Writer allocated at {:?} with tracks {:?}",
            path,
            tracks.iter().map(|t| t.to_string()).collect::<Vec<_>>()
        );

        Ok(Self {
            path: path.to_path_buf(),
            tracks,
            shared,
            completion: Mutex::new(Some(done_rx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> WriterState {
        self.shared.gate.lock().state
    }

    /// Session start-time anchor, once the first video sample arrived
    pub fn anchor_us(&self) -> Option<i64> {
        self.shared.gate.lock().anchor_us
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.tracks.contains(&kind)
    }

    /// State of a configured track, `None` for tracks not in this session
    pub fn track_state(&self, kind: TrackKind) -> Option<TrackState> {
        self.shared.gate.lock().inputs[kind.index()]
            .as_ref()
            .map(|input| input.state())
    }

    /// Samples dropped so far on a track
    pub fn dropped(&self, kind: TrackKind) -> u64 {
        self.shared.drops.get(kind)
    }

    pub fn ingest_video(&self, pts_us: i64, payload: Vec<u8>) -> IngestOutcome {
        self.ingest(MediaSample::video(pts_us, payload))
    }

    pub fn ingest_system_audio(&self, pts_us: i64, payload: Vec<u8>) -> IngestOutcome {
        self.ingest(MediaSample::system_audio(pts_us, payload))
    }

    pub fn ingest_microphone(&self, pts_us: i64, payload: Vec<u8>) -> IngestOutcome {
        self.ingest(MediaSample::microphone(pts_us, payload))
    }

    /// Route a sample to its track. Never blocks; unready samples are dropped.
    pub fn ingest(&self, sample: MediaSample) -> IngestOutcome {
        let kind = sample.track;
        let outcome = self.try_ingest(sample);
        if let IngestOutcome::Dropped(reason) = outcome {
            self.shared.drops.record(kind, reason);
        }
        outcome
    }

    fn try_ingest(&self, sample: MediaSample) -> IngestOutcome {
        let mut gate = self.shared.gate.lock();

        if sample.track == TrackKind::Video && gate.state == WriterState::AwaitingFirstSample {
            gate.state = WriterState::Writing;
            gate.anchor_us = Some(sample.pts_us);
            tracing::info!("Writer started, session anchored at {}us", sample.pts_us);
        }

        match gate.state {
            WriterState::Writing => {}
            WriterState::AwaitingFirstSample => {
                return IngestOutcome::Dropped(DropReason::NotWriting)
            }
            _ => return IngestOutcome::Dropped(DropReason::WriterClosed),
        }

        if gate.anchor_us.is_some_and(|anchor| sample.pts_us < anchor) {
            return IngestOutcome::Dropped(DropReason::BeforeAnchor);
        }

        match gate.inputs[sample.track.index()].as_mut() {
            Some(input) => input.try_append(sample),
            None => IngestOutcome::Dropped(DropReason::NoSuchTrack),
        }
    }

    /// Close every track input. Returns the state before closing.
    fn close_inputs(&self, next: WriterState) -> WriterState {
        let mut gate = self.shared.gate.lock();
        let prior = gate.state;
        if matches!(prior, WriterState::Finishing | WriterState::Finalized) {
            return prior;
        }

        gate.state = if prior == WriterState::Writing {
            next
        } else {
            WriterState::Failed
        };
        for input in gate.inputs.iter_mut().flatten() {
            input.finish();
        }
        prior
    }

    async fn wait_for_worker(&self) -> RecorderResult<io::Result<ContainerTrailer>> {
        let completion = self.completion.lock().take().ok_or_else(|| {
            RecorderError::WriterFinalizeFailed("finish already requested".to_string())
        })?;

        let result = completion.await.map_err(|_| {
            RecorderError::WriterFinalizeFailed("writer exited without completing".to_string())
        });

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if tokio::task::spawn_blocking(move || worker.join()).await.is_err() {
                tracing::warn!("Writer worker could not be joined");
            }
        }

        result
    }

    fn discard_file(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove unfinished recording {:?}: {}", self.path, e);
            }
        }
    }

    /// Finish all tracks and finalize the container.
    ///
    /// Waits until the worker has drained every queue, written the trailer
    /// and synced the file.
    pub async fn finish(&self) -> RecorderResult<PreviewArtifact> {
        let prior = self.close_inputs(WriterState::Finishing);
        if matches!(prior, WriterState::Finishing | WriterState::Finalized) {
            return Err(RecorderError::WriterFinalizeFailed(
                "finish already requested".to_string(),
            ));
        }

        tracing::info!("Finishing writer at {:?}", self.path);
        let result = self.wait_for_worker().await?;

        if prior == WriterState::AwaitingFirstSample {
            self.discard_file();
            return Err(RecorderError::WriterFinalizeFailed(
                "writer never started: no video sample arrived".to_string(),
            ));
        }

        let trailer = match result {
            Ok(trailer) => trailer,
            Err(e) => {
                self.shared.gate.lock().state = WriterState::Failed;
                self.discard_file();
                return Err(RecorderError::WriterFinalizeFailed(e.to_string()));
            }
        };

        self.shared.gate.lock().state = WriterState::Finalized;

        let anchor = trailer.anchor_us.unwrap_or(0);
        let duration_us = trailer
            .tracks
            .iter()
            .filter_map(|t| t.last_pts_us)
            .map(|last| last - anchor)
            .max()
            .unwrap_or(0);

        let tracks = self
            .tracks
            .iter()
            .map(|kind| TrackReport {
                kind: *kind,
                samples: trailer.track(*kind).map(|t| t.samples).unwrap_or(0),
                dropped: self.dropped(*kind),
            })
            .collect::<Vec<_>>();

        for report in &tracks {
            tracing::debug!(
                "Track {}: {} samples written, {} dropped",
                report.kind,
                report.samples,
                report.dropped
            );
        }

        Ok(PreviewArtifact {
            path: self.path.clone(),
            duration_ms: duration_us as f64 / 1000.0,
            tracks,
        })
    }

    /// Tear the session down without producing an artifact
    pub async fn abort(&self) {
        let prior = self.close_inputs(WriterState::Failed);
        if matches!(prior, WriterState::Finishing | WriterState::Finalized) {
            return;
        }

        tracing::info!("Aborting writer at {:?}", self.path);
        if let Err(e) = self.wait_for_worker().await {
            tracing::warn!("Writer abort: {}", e);
        }
        self.discard_file();
    }
}

impl Drop for TrackWriter {
    /// A writer dropped before `finish()` or `abort()` is torn down like
    /// `abort()`: its queues are closed, the worker joined and the file
    /// removed. A finalized file is left alone.
    fn drop(&mut self) {
        let prior = self.close_inputs(WriterState::Failed);
        if matches!(prior, WriterState::Finishing | WriterState::Finalized) {
            return;
        }

        if let Some(worker) = self.worker.get_mut().take() {
            tracing::info!("Writer at {:?} dropped unfinished, discarding", self.path);
            if worker.join().is_err() {
                tracing::warn!("Writer worker panicked");
            }
        }
        self.discard_file();
    }
}

/// Worker loop: drain the track queues into the file until every queue is
/// closed, then write the trailer and report through `done`.
fn run_worker(
    mut file: ContainerFile,
    mut live: Vec<(TrackKind, Receiver<MediaSample>)>,
    shared: Arc<WriterShared>,
    done: oneshot::Sender<io::Result<ContainerTrailer>>,
) {
    let mut failure: Option<io::Error> = None;

    while !live.is_empty() {
        let (index, received) = {
            let mut select = Select::new();
            for (_, rx) in &live {
                select.recv(rx);
            }
            let op = select.select();
            let index = op.index();
            (index, op.recv(&live[index].1))
        };

        match received {
            Ok(sample) => {
                if failure.is_some() {
                    continue;
                }
                if let Err(e) = file.write_sample(&sample) {
                    tracing::error!("Write to {:?} failed: {}", file.path(), e);
                    shared.gate.lock().state = WriterState::Failed;
                    failure = Some(e);
                }
            }
            Err(_) => {
                let (kind, _) = live.swap_remove(index);
                tracing::trace!("Track {} queue drained", kind);
            }
        }
    }

    let result = match failure {
        Some(e) => Err(e),
        None => {
            let anchor = shared.gate.lock().anchor_us;
            file.finalize(anchor)
        }
    };

    if done.send(result).is_err() {
        tracing::debug!("Writer completion had no listener");
    }
}
