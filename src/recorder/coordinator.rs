//! Recording coordinator
//!
//! Owns the screen source, the microphone capture and the track writer of the
//! active recording, drives the Idle → Recording → Stopped lifecycle and holds
//! the finished preview until the host consumes it.

use super::state::{RecordingConfig, RecordingSession, RecordingState};
use crate::capture::adapters::{SampleSink, ScreenSampleAdapter};
use crate::capture::clock::MediaClock;
use crate::capture::microphone::MicrophoneCapture;
use crate::capture::traits::{
    AudioDeviceInfo, MicrophoneBackend, ScreenCaptureOptions, ScreenCaptureSource, TrackKind,
};
use crate::capture::{default_microphone_backend, TimedScreenSource};
use crate::muxer::{PreviewArtifact, TrackWriter, WriterOptions};
use crate::utils::error::{RecorderError, RecorderResult};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Events emitted over the recording lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// `initialise()` finished; `error` is set when screen capture is missing
    Initialised { error: Option<String> },
    /// Recording started
    Started,
    /// Recording stopped
    Stopped,
    /// A finished recording is available for preview
    Available { path: String },
    /// Starting or finishing a recording failed
    Failed(String),
    /// Preview playback launched
    PreviewOpened,
    /// Preview playback dismissed
    PreviewClosed,
    /// Preview handed to the share target
    PreviewShared,
    /// Save to library finished; `error` is set when it failed
    PreviewSaved { error: Option<String> },
    /// Preview deleted
    Discarded,
}

/// Coordinates capture sources and the writer for one recording at a time
pub struct RecordingCoordinator {
    /// Current recording state
    state: Arc<RwLock<RecordingState>>,

    config: RecordingConfig,

    /// Screen frames with bundled system audio
    source: Box<dyn ScreenCaptureSource>,

    microphone: MicrophoneCapture,

    /// Time base shared by every producer
    clock: MediaClock,

    /// Current or most recent session
    session: Option<RecordingSession>,

    writer: Option<Arc<TrackWriter>>,

    /// Finished recording not yet consumed
    preview: Option<PreviewArtifact>,

    /// Time when recording started (for duration)
    start_time: Option<Instant>,

    initialised: bool,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingCoordinator {
    /// Create a coordinator over the given capture collaborators
    pub fn new(
        config: RecordingConfig,
        source: Box<dyn ScreenCaptureSource>,
        microphone_backend: Arc<dyn MicrophoneBackend>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let clock = MediaClock::new();
        let microphone = MicrophoneCapture::new(
            microphone_backend,
            config.microphone_device_id.clone(),
            config.microphone_queue_capacity,
            clock,
        );

        Self {
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            config,
            source,
            microphone,
            clock,
            session: None,
            writer: None,
            preview: None,
            start_time: None,
            initialised: false,
            event_tx,
        }
    }

    /// Coordinator with the built-in screen source and the compiled-in
    /// microphone backend
    pub fn with_defaults(config: RecordingConfig) -> Self {
        Self::new(
            config,
            Box::new(TimedScreenSource::new(30)),
            default_microphone_backend(),
        )
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: RecordingEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// One-time setup announced to subscribers
    ///
    /// Checks for the capture facility and prepares the output directory,
    /// then emits `Initialised`. Returns whether recording is possible.
    /// Later calls only report the result again.
    pub fn initialise(&mut self) -> bool {
        if self.initialised {
            tracing::debug!("Already initialised");
            return self.is_api_available();
        }
        self.initialised = true;

        let error = if !self.is_api_available() {
            Some("screen capture is not available".to_string())
        } else if let Err(e) = std::fs::create_dir_all(&self.config.output_dir) {
            Some(format!("cannot create {:?}: {}", self.config.output_dir, e))
        } else {
            None
        };

        match &error {
            None => tracing::info!("Recorder initialised ({})", self.source.id()),
            Some(e) => tracing::warn!("Recorder initialisation failed: {}", e),
        }
        let ready = error.is_none();
        self.emit(RecordingEvent::Initialised { error });
        ready
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Whether screen capture exists on this device
    pub fn is_api_available(&self) -> bool {
        self.source.is_available()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    pub fn is_preview_available(&self) -> bool {
        self.preview.is_some()
    }

    /// Whether the current or most recent session captures the microphone
    pub fn is_microphone_enabled(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.microphone_active)
            .unwrap_or(false)
    }

    pub fn current_session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn preview_artifact(&self) -> Option<&PreviewArtifact> {
        self.preview.as_ref()
    }

    /// Enumerate microphone inputs
    pub fn audio_devices(&self) -> Vec<AudioDeviceInfo> {
        self.microphone.list_input_devices()
    }

    /// Get recording duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        match self.state() {
            RecordingState::Recording => self
                .start_time
                .map(|t| t.elapsed().as_secs_f64() * 1000.0)
                .unwrap_or(0.0),
            RecordingState::Stopped => self.preview.as_ref().map(|p| p.duration_ms).unwrap_or(0.0),
            RecordingState::Idle => 0.0,
        }
    }

    /// Start recording
    ///
    /// A no-op when screen capture is unavailable or a recording is already
    /// running. A preview still held from the previous recording is
    /// discarded.
    pub async fn start_recording(&mut self, microphone_enabled: bool) -> RecorderResult<()> {
        if !self.is_api_available() {
            tracing::warn!("Screen capture unavailable, not starting");
            return Ok(());
        }
        if self.is_recording() {
            tracing::debug!("Start ignored: already recording");
            return Ok(());
        }

        if self.preview.is_some() {
            tracing::info!("Discarding unconsumed preview before starting");
            if !self.discard_recording() {
                self.release_preview();
            }
        }

        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| {
            RecorderError::WriterAllocationFailed(format!(
                "cannot create {:?}: {}",
                self.config.output_dir, e
            ))
        })?;

        let mut session = RecordingSession::new(&self.config, microphone_enabled);
        tracing::info!("Starting recording {} to {:?}", session.id, session.output_path);

        // Any pipeline left from an earlier session is torn down and
        // reopened for this one
        self.microphone.stop();
        self.microphone
            .set_device(self.config.microphone_device_id.clone());
        if microphone_enabled {
            match self.microphone.prepare() {
                Ok(()) => session.microphone_active = true,
                Err(e) => tracing::warn!("Recording without microphone: {}", e),
            }
        }

        let options = WriterOptions {
            queue_capacity: self.config.track_queue_capacity,
            video_quality: self.config.video_quality,
        };
        let mut writer = self.begin_writer(&session, options)?;

        if session.microphone_active {
            if let Err(e) = self
                .microphone
                .start(SampleSink::new(TrackKind::Microphone, writer.clone()))
            {
                // Reallocate without the microphone track so the file
                // does not declare a track that can never be fed
                tracing::warn!("Microphone failed to start, recording without it: {}", e);
                session.microphone_active = false;
                writer.abort().await;
                writer = self.begin_writer(&session, options)?;
            }
        }

        let capture_options = ScreenCaptureOptions {
            video_quality: self.config.video_quality,
            bitrate_factor: self.config.custom_bitrate_factor,
        };
        let adapter = ScreenSampleAdapter::new(self.clock, writer.clone());
        if let Err(e) = self.source.start(capture_options, adapter).await {
            tracing::error!("Screen source {} failed to start: {}", self.source.id(), e);
            self.microphone.stop();
            writer.abort().await;
            self.emit(RecordingEvent::Failed(e.to_string()));
            return Err(e);
        }

        self.writer = Some(writer);
        self.session = Some(session);
        self.start_time = Some(Instant::now());
        *self.state.write() = RecordingState::Recording;
        self.emit(RecordingEvent::Started);

        tracing::info!("Recording started");
        Ok(())
    }

    /// Allocate the writer for `session`, declaring the microphone track
    /// only when the microphone pipeline is up
    fn begin_writer(
        &mut self,
        session: &RecordingSession,
        options: WriterOptions,
    ) -> RecorderResult<Arc<TrackWriter>> {
        match TrackWriter::begin_session(&session.output_path, session.microphone_active, options)
        {
            Ok(writer) => Ok(Arc::new(writer)),
            Err(e) => {
                self.microphone.stop();
                self.emit(RecordingEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Stop recording and finalize the container
    ///
    /// A no-op when not recording. On success the finished recording is
    /// held as the preview.
    pub async fn stop_recording(&mut self) -> RecorderResult<()> {
        if !self.is_recording() {
            tracing::debug!("Stop ignored: not recording");
            return Ok(());
        }

        tracing::info!("Stopping recording");

        if let Err(e) = self.source.stop().await {
            tracing::warn!("Screen source {} failed to stop: {}", self.source.id(), e);
        }
        self.microphone.stop();
        self.start_time = None;

        let Some(writer) = self.writer.take() else {
            *self.state.write() = RecordingState::Idle;
            return Err(RecorderError::WriterFinalizeFailed(
                "no active writer".to_string(),
            ));
        };

        match writer.finish().await {
            Ok(artifact) => {
                if let Some(session) = self.session.as_mut() {
                    session.end(artifact.duration_ms);
                }
                let path = artifact.path_string();
                tracing::info!(
                    "Recording stopped. Duration: {}ms, file: {}",
                    artifact.duration_ms,
                    path
                );

                self.preview = Some(artifact);
                *self.state.write() = RecordingState::Stopped;
                self.emit(RecordingEvent::Stopped);
                self.emit(RecordingEvent::Available { path });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Recording could not be finalized: {}", e);
                *self.state.write() = RecordingState::Idle;
                self.emit(RecordingEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete the preview's backing file and drop the preview
    ///
    /// Returns false when there is no preview or the file could not be
    /// removed.
    pub fn discard_recording(&mut self) -> bool {
        let Some(artifact) = self.preview.as_ref() else {
            tracing::debug!("Discard ignored: no preview");
            return false;
        };

        if let Err(e) = std::fs::remove_file(&artifact.path) {
            tracing::warn!("Failed to discard {:?}: {}", artifact.path, e);
            return false;
        }

        tracing::info!("Discarded recording {:?}", artifact.path);
        self.release_preview();
        self.emit(RecordingEvent::Discarded);
        true
    }

    /// Drop the preview without touching its file
    pub(crate) fn release_preview(&mut self) -> Option<PreviewArtifact> {
        let artifact = self.preview.take();
        if self.state() == RecordingState::Stopped {
            *self.state.write() = RecordingState::Idle;
        }
        artifact
    }
}

impl Default for RecordingCoordinator {
    fn default() -> Self {
        Self::with_defaults(RecordingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::NoMicrophone;
    use crate::muxer::read_summary;
    use crate::testing::{BrokenScreenSource, FakeMicrophone};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config(dir: &Path) -> RecordingConfig {
        RecordingConfig {
            output_dir: dir.join("recordings"),
            ..RecordingConfig::default()
        }
    }

    fn coordinator(dir: &Path, microphone: Arc<dyn MicrophoneBackend>) -> RecordingCoordinator {
        RecordingCoordinator::new(config(dir), Box::new(TimedScreenSource::new(30)), microphone)
    }

    #[tokio::test]
    async fn test_two_second_recording_without_microphone() {
        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(NoMicrophone));
        let mut events = coordinator.subscribe();

        assert!(!coordinator.is_preview_available());
        coordinator.start_recording(false).await.unwrap();
        assert!(coordinator.is_recording());
        assert!(!coordinator.is_preview_available());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(coordinator.duration_ms() > 0.0);
        coordinator.stop_recording().await.unwrap();

        assert_eq!(coordinator.state(), RecordingState::Stopped);
        assert!(coordinator.is_preview_available());
        let artifact = coordinator.preview_artifact().unwrap();
        assert!(!artifact.path_string().is_empty());
        assert!(artifact.path.exists());
        assert_eq!(artifact.tracks.len(), 2);
        assert!(artifact.duration_ms > 1000.0);

        let summary = read_summary(&artifact.path).unwrap();
        assert_eq!(
            summary.track_kinds(),
            vec![TrackKind::Video, TrackKind::SystemAudio]
        );
        let anchor = summary.trailer.anchor_us.unwrap();
        assert_eq!(summary.timestamps(TrackKind::Video)[0], anchor);
        assert!(summary.records.iter().all(|r| r.pts_us >= anchor));
        assert!(!summary.timestamps(TrackKind::SystemAudio).is_empty());

        assert_eq!(events.recv().await.unwrap(), RecordingEvent::Started);
        assert_eq!(events.recv().await.unwrap(), RecordingEvent::Stopped);
        assert_eq!(
            events.recv().await.unwrap(),
            RecordingEvent::Available {
                path: artifact.path_string()
            }
        );
    }

    #[tokio::test]
    async fn test_denied_microphone_records_two_tracks() {
        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(FakeMicrophone::denied()));

        coordinator.start_recording(true).await.unwrap();
        assert!(coordinator.is_recording());
        assert!(!coordinator.is_microphone_enabled());
        assert!(coordinator.current_session().unwrap().microphone_enabled);

        tokio::time::sleep(Duration::from_millis(300)).await;
        coordinator.stop_recording().await.unwrap();

        let artifact = coordinator.preview_artifact().unwrap();
        assert!(artifact.track(TrackKind::Microphone).is_none());
        let summary = read_summary(&artifact.path).unwrap();
        assert!(!summary.header.has_track(TrackKind::Microphone));
        assert!(summary.timestamps(TrackKind::Microphone).is_empty());
    }

    #[tokio::test]
    async fn test_microphone_that_fails_to_play_leaves_no_track() {
        let dir = tempdir().unwrap();
        let microphone = Arc::new(FakeMicrophone::play_denied());
        let mut coordinator = coordinator(dir.path(), microphone.clone());

        coordinator.start_recording(true).await.unwrap();
        assert!(coordinator.is_recording());
        assert!(!coordinator.is_microphone_enabled());
        assert!(!microphone.is_open());

        tokio::time::sleep(Duration::from_millis(200)).await;
        coordinator.stop_recording().await.unwrap();

        let artifact = coordinator.preview_artifact().unwrap();
        assert_eq!(artifact.tracks.len(), 2);
        let summary = read_summary(&artifact.path).unwrap();
        assert!(!summary.header.has_track(TrackKind::Microphone));
        assert!(!summary.timestamps(TrackKind::Video).is_empty());

        // Only the reallocated file is left behind
        let files = std::fs::read_dir(dir.path().join("recordings")).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn test_initialise_reports_once() {
        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(NoMicrophone));
        let mut events = coordinator.subscribe();

        assert!(!coordinator.is_initialised());
        assert!(coordinator.initialise());
        assert!(coordinator.is_initialised());
        assert!(dir.path().join("recordings").is_dir());
        assert_eq!(
            events.recv().await.unwrap(),
            RecordingEvent::Initialised { error: None }
        );

        // A second call emits nothing
        assert!(coordinator.initialise());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_initialise_without_capture_api_fails() {
        let dir = tempdir().unwrap();
        let mut coordinator = RecordingCoordinator::new(
            config(dir.path()),
            Box::new(TimedScreenSource::new(30).unavailable()),
            Arc::new(NoMicrophone),
        );
        let mut events = coordinator.subscribe();

        assert!(!coordinator.initialise());
        assert!(matches!(
            events.recv().await.unwrap(),
            RecordingEvent::Initialised { error: Some(_) }
        ));
    }

    #[tokio::test]
    async fn test_microphone_track_receives_buffers() {
        let dir = tempdir().unwrap();
        let microphone = Arc::new(FakeMicrophone::available());
        let mut coordinator = coordinator(dir.path(), microphone.clone());

        coordinator.start_recording(true).await.unwrap();
        assert!(coordinator.is_microphone_enabled());

        // Wait for the first frame to anchor the session
        tokio::time::sleep(Duration::from_millis(200)).await;
        for _ in 0..10 {
            microphone.emit(vec![0u8; 256]);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        coordinator.stop_recording().await.unwrap();
        assert!(!microphone.is_open());

        let artifact = coordinator.preview_artifact().unwrap();
        assert_eq!(artifact.tracks.len(), 3);
        let summary = read_summary(&artifact.path).unwrap();
        let anchor = summary.trailer.anchor_us.unwrap();
        let stamps = summary.timestamps(TrackKind::Microphone);
        assert!(!stamps.is_empty());
        assert!(stamps.iter().all(|pts| *pts >= anchor));
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(NoMicrophone));

        // Stop while idle changes nothing
        coordinator.stop_recording().await.unwrap();
        assert_eq!(coordinator.state(), RecordingState::Idle);
        assert!(!coordinator.is_preview_available());

        coordinator.start_recording(false).await.unwrap();
        let first = coordinator.current_session().unwrap().id.clone();

        // Second start keeps the running session
        coordinator.start_recording(true).await.unwrap();
        assert!(coordinator.is_recording());
        assert_eq!(coordinator.current_session().unwrap().id, first);

        tokio::time::sleep(Duration::from_millis(150)).await;
        coordinator.stop_recording().await.unwrap();
        let path = coordinator.preview_artifact().unwrap().path.clone();

        // Stop after stop keeps the preview
        coordinator.stop_recording().await.unwrap();
        assert_eq!(coordinator.state(), RecordingState::Stopped);
        assert_eq!(coordinator.preview_artifact().unwrap().path, path);
    }

    #[tokio::test]
    async fn test_discard_twice() {
        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(NoMicrophone));

        coordinator.start_recording(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        coordinator.stop_recording().await.unwrap();
        let path = coordinator.preview_artifact().unwrap().path.clone();

        assert!(coordinator.discard_recording());
        assert!(!path.exists());
        assert!(!coordinator.is_preview_available());
        assert_eq!(coordinator.state(), RecordingState::Idle);

        assert!(!coordinator.discard_recording());
    }

    #[tokio::test]
    async fn test_new_recording_discards_unconsumed_preview() {
        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(NoMicrophone));

        coordinator.start_recording(false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        coordinator.stop_recording().await.unwrap();
        let old = coordinator.preview_artifact().unwrap().path.clone();

        coordinator.start_recording(false).await.unwrap();
        assert!(!old.exists());
        assert!(!coordinator.is_preview_available());

        tokio::time::sleep(Duration::from_millis(150)).await;
        coordinator.stop_recording().await.unwrap();
        let new = coordinator.preview_artifact().unwrap().path.clone();
        assert_ne!(old, new);
        assert!(new.exists());
    }

    #[tokio::test]
    async fn test_stop_before_first_frame_fails_finalize() {
        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(NoMicrophone));
        let mut events = coordinator.subscribe();

        // On the current-thread runtime the capture task is not polled
        // before the stop, so no frame ever reaches the writer
        coordinator.start_recording(false).await.unwrap();
        let result = coordinator.stop_recording().await;

        assert!(matches!(result, Err(RecorderError::WriterFinalizeFailed(_))));
        assert_eq!(coordinator.state(), RecordingState::Idle);
        assert!(!coordinator.is_preview_available());
        assert_eq!(events.recv().await.unwrap(), RecordingEvent::Started);
        assert!(matches!(events.recv().await.unwrap(), RecordingEvent::Failed(_)));
    }

    #[tokio::test]
    async fn test_unavailable_capture_api_is_a_no_op() {
        let dir = tempdir().unwrap();
        let mut coordinator = RecordingCoordinator::new(
            config(dir.path()),
            Box::new(TimedScreenSource::new(30).unavailable()),
            Arc::new(NoMicrophone),
        );

        assert!(!coordinator.is_api_available());
        coordinator.start_recording(false).await.unwrap();
        assert_eq!(coordinator.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_source_failure_tears_down_session() {
        let dir = tempdir().unwrap();
        let microphone = Arc::new(FakeMicrophone::available());
        let mut coordinator = RecordingCoordinator::new(
            config(dir.path()),
            Box::new(BrokenScreenSource),
            microphone.clone(),
        );
        let mut events = coordinator.subscribe();

        let result = coordinator.start_recording(true).await;
        assert!(matches!(result, Err(RecorderError::DeviceUnavailable(_))));
        assert_eq!(coordinator.state(), RecordingState::Idle);
        assert!(!microphone.is_open());
        assert!(matches!(events.recv().await.unwrap(), RecordingEvent::Failed(_)));

        // Nothing left behind in the output directory
        let leftovers = std::fs::read_dir(dir.path().join("recordings")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
