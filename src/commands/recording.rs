//! Recording-related host commands

use crate::capture::traits::AudioDeviceInfo;
use crate::export::PreviewGateway;
use crate::recorder::{RecordingConfig, RecordingCoordinator, RecordingState};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state for recording
pub struct RecorderState {
    pub coordinator: Arc<Mutex<RecordingCoordinator>>,
    pub gateway: PreviewGateway,
}

impl RecorderState {
    pub fn new(coordinator: RecordingCoordinator, gateway: PreviewGateway) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
            gateway,
        }
    }

    /// Default collaborators over the given configuration
    pub fn with_config(config: RecordingConfig) -> Self {
        Self::new(
            RecordingCoordinator::with_defaults(config),
            PreviewGateway::default(),
        )
    }
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::with_config(RecordingConfig::default())
    }
}

/// One-time recorder setup; returns whether recording is possible
pub async fn initialise(state: &RecorderState) -> Result<bool, String> {
    let mut coordinator = state.coordinator.lock().await;
    Ok(coordinator.initialise())
}

pub async fn is_initialised(state: &RecorderState) -> Result<bool, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.is_initialised())
}

/// Whether screen recording is supported here
pub async fn is_api_available(state: &RecorderState) -> Result<bool, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.is_api_available())
}

/// Start recording
pub async fn start_recording(
    state: &RecorderState,
    microphone_enabled: bool,
) -> Result<(), String> {
    let mut coordinator = state.coordinator.lock().await;
    coordinator
        .start_recording(microphone_enabled)
        .await
        .map_err(|e| e.to_string())
}

/// Stop recording
pub async fn stop_recording(state: &RecorderState) -> Result<(), String> {
    let mut coordinator = state.coordinator.lock().await;
    coordinator.stop_recording().await.map_err(|e| e.to_string())
}

pub async fn is_recording(state: &RecorderState) -> Result<bool, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.is_recording())
}

pub async fn is_preview_available(state: &RecorderState) -> Result<bool, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.is_preview_available())
}

pub async fn get_preview_file_path(state: &RecorderState) -> Result<Option<String>, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(state.gateway.get_preview_file_path(&coordinator))
}

/// Play the finished recording
pub async fn preview_recording(state: &RecorderState) -> Result<bool, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(state.gateway.preview_recording(&coordinator))
}

/// Playback of the finished recording was dismissed
pub async fn close_preview(state: &RecorderState) -> Result<(), String> {
    let coordinator = state.coordinator.lock().await;
    state.gateway.close_preview(&coordinator);
    Ok(())
}

/// Delete the finished recording
pub async fn discard_recording(state: &RecorderState) -> Result<bool, String> {
    let mut coordinator = state.coordinator.lock().await;
    Ok(state.gateway.discard_recording(&mut coordinator))
}

/// Save the finished recording to the media library; returns the saved path
pub async fn save_preview(state: &RecorderState, destination: String) -> Result<String, String> {
    let mut coordinator = state.coordinator.lock().await;
    state
        .gateway
        .save_preview(&mut coordinator, Path::new(&destination))
        .map(|path| path.to_string_lossy().to_string())
        .map_err(|e| e.to_string())
}

/// Share the finished recording
pub async fn share_preview(
    state: &RecorderState,
    text: String,
    subject: String,
) -> Result<(), String> {
    let mut coordinator = state.coordinator.lock().await;
    state
        .gateway
        .share_preview(&mut coordinator, &text, &subject)
        .map_err(|e| e.to_string())
}

/// Get current recording state
pub async fn get_recording_state(state: &RecorderState) -> Result<RecordingState, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.state())
}

/// Get current recording duration in milliseconds
pub async fn get_recording_duration(state: &RecorderState) -> Result<f64, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.duration_ms())
}

/// Get list of available audio input devices (microphones)
pub async fn get_audio_devices(state: &RecorderState) -> Result<Vec<AudioDeviceInfo>, String> {
    let coordinator = state.coordinator.lock().await;
    Ok(coordinator.audio_devices())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TimedScreenSource;
    use crate::export::{FolderLibrary, FolderShareTarget};
    use crate::testing::{FakeMicrophone, RecordingPlayer};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn state(dir: &TempDir) -> RecorderState {
        let config = RecordingConfig {
            output_dir: dir.path().join("recordings"),
            ..RecordingConfig::default()
        };
        let coordinator = RecordingCoordinator::new(
            config,
            Box::new(TimedScreenSource::new(30)),
            Arc::new(FakeMicrophone::available()),
        );
        let gateway = PreviewGateway::new(
            Arc::new(RecordingPlayer::default()),
            Arc::new(FolderLibrary::new(dir.path().join("library"))),
            Arc::new(FolderShareTarget::new(dir.path().join("outbox"))),
        );
        RecorderState::new(coordinator, gateway)
    }

    #[tokio::test]
    async fn test_record_preview_and_save() {
        let dir = tempdir().unwrap();
        let state = state(&dir);

        assert!(!is_initialised(&state).await.unwrap());
        assert!(initialise(&state).await.unwrap());
        assert!(is_initialised(&state).await.unwrap());
        assert!(is_api_available(&state).await.unwrap());
        assert_eq!(get_recording_state(&state).await.unwrap(), RecordingState::Idle);
        assert!(!is_preview_available(&state).await.unwrap());

        start_recording(&state, false).await.unwrap();
        assert!(is_recording(&state).await.unwrap());
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop_recording(&state).await.unwrap();

        assert_eq!(get_recording_state(&state).await.unwrap(), RecordingState::Stopped);
        assert!(is_preview_available(&state).await.unwrap());
        assert!(get_recording_duration(&state).await.unwrap() > 0.0);
        assert!(get_preview_file_path(&state).await.unwrap().is_some());
        assert!(preview_recording(&state).await.unwrap());
        close_preview(&state).await.unwrap();

        let saved = save_preview(&state, "clips/first.srcf".to_string())
            .await
            .unwrap();
        assert!(Path::new(&saved).exists());
        assert!(!is_preview_available(&state).await.unwrap());
        assert!(!discard_recording(&state).await.unwrap());
    }

    #[tokio::test]
    async fn test_errors_surface_as_messages() {
        let dir = tempdir().unwrap();
        let state = state(&dir);

        let err = share_preview(&state, "hi".to_string(), "subject".to_string())
            .await
            .unwrap_err();
        assert!(err.contains("Share unavailable"));

        let err = save_preview(&state, "x.srcf".to_string()).await.unwrap_err();
        assert!(err.contains("Failed to save preview"));
    }

    #[tokio::test]
    async fn test_audio_devices_come_from_backend() {
        let dir = tempdir().unwrap();
        let devices = get_audio_devices(&state(&dir)).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_default);
    }
}
