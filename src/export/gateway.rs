//! Preview/export gateway
//!
//! Turns the coordinator's finished recording into playback, save-to-library
//! and share invocations. Saving and sharing hand the file off and release
//! the preview; playing it does not.

use super::targets::{FolderLibrary, FolderShareTarget, SystemPlayer};
use super::types::{MediaLibrary, PreviewPlayer, ShareRequest, ShareTarget};
use crate::recorder::{RecordingCoordinator, RecordingEvent};
use crate::utils::error::{RecorderError, RecorderResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Routes a finished recording to the player, library and share target
#[derive(Clone)]
pub struct PreviewGateway {
    player: Arc<dyn PreviewPlayer>,
    library: Arc<dyn MediaLibrary>,
    share: Arc<dyn ShareTarget>,
}

impl PreviewGateway {
    pub fn new(
        player: Arc<dyn PreviewPlayer>,
        library: Arc<dyn MediaLibrary>,
        share: Arc<dyn ShareTarget>,
    ) -> Self {
        Self {
            player,
            library,
            share,
        }
    }

    /// Path of the held recording, if any
    pub fn get_preview_file_path(&self, coordinator: &RecordingCoordinator) -> Option<String> {
        coordinator.preview_artifact().map(|a| a.path_string())
    }

    /// Launch playback of the held recording
    pub fn preview_recording(&self, coordinator: &RecordingCoordinator) -> bool {
        let Some(artifact) = coordinator.preview_artifact() else {
            tracing::debug!("Preview ignored: no recording available");
            return false;
        };

        match self.player.play(&artifact.path) {
            Ok(()) => {
                tracing::info!("Preview opened for {:?}", artifact.path);
                coordinator.emit(RecordingEvent::PreviewOpened);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to open preview: {:#}", e);
                false
            }
        }
    }

    /// Host notification that playback was dismissed
    pub fn close_preview(&self, coordinator: &RecordingCoordinator) {
        if coordinator.is_preview_available() {
            coordinator.emit(RecordingEvent::PreviewClosed);
        }
    }

    /// Move the held recording into the media library
    pub fn save_preview(
        &self,
        coordinator: &mut RecordingCoordinator,
        destination: &Path,
    ) -> RecorderResult<PathBuf> {
        let result = self.try_save(coordinator, destination);

        let error = result.as_ref().err().map(|e| e.to_string());
        if let Some(error) = &error {
            tracing::warn!("{}", error);
        }
        coordinator.emit(RecordingEvent::PreviewSaved { error });

        if result.is_ok() {
            coordinator.release_preview();
        }
        result
    }

    fn try_save(
        &self,
        coordinator: &RecordingCoordinator,
        destination: &Path,
    ) -> RecorderResult<PathBuf> {
        let artifact = coordinator
            .preview_artifact()
            .ok_or_else(|| RecorderError::SaveFailed("preview unavailable".to_string()))?;

        if !coordinator.config().allow_save_to_library {
            return Err(RecorderError::SaveFailed(
                "permission unavailable".to_string(),
            ));
        }

        let saved = self
            .library
            .save(&artifact.path, destination)
            .map_err(|e| RecorderError::SaveFailed(format!("{:#}", e)))?;
        tracing::info!("Preview saved to {:?}", saved);
        Ok(saved)
    }

    /// Hand the held recording to the share target
    pub fn share_preview(
        &self,
        coordinator: &mut RecordingCoordinator,
        text: &str,
        subject: &str,
    ) -> RecorderResult<()> {
        let artifact = coordinator
            .preview_artifact()
            .ok_or_else(|| RecorderError::ShareUnavailable("preview unavailable".to_string()))?;

        let request = ShareRequest {
            path: artifact.path.clone(),
            text: text.to_string(),
            subject: subject.to_string(),
        };
        self.share
            .share(&request)
            .map_err(|e| RecorderError::ShareUnavailable(format!("{:#}", e)))?;

        tracing::info!("Preview shared: {:?}", request.path);
        coordinator.release_preview();
        coordinator.emit(RecordingEvent::PreviewShared);
        Ok(())
    }

    /// Delete the held recording
    pub fn discard_recording(&self, coordinator: &mut RecordingCoordinator) -> bool {
        coordinator.discard_recording()
    }
}

impl Default for PreviewGateway {
    fn default() -> Self {
        Self::new(
            Arc::new(SystemPlayer),
            Arc::new(FolderLibrary::default()),
            Arc::new(FolderShareTarget::default()),
        )
    }
}
