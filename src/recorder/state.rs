//! Recording state management
//!
//! Defines the recording state machine, session tracking and engine
//! configuration.

use crate::capture::traits::VideoQuality;
use crate::muxer::FILE_EXTENSION;
use crate::utils::error::RecorderResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress, no preview held
    Idle,
    /// Currently recording
    Recording,
    /// Recording finished, preview available
    Stopped,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// One recording attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Unique session ID
    pub id: String,

    /// Container file this session writes
    pub output_path: PathBuf,

    /// Whether the caller asked for microphone audio
    pub microphone_enabled: bool,

    /// Whether the microphone pipeline actually came up
    pub microphone_active: bool,

    /// Wall-clock start
    pub started_at: DateTime<Utc>,

    /// Duration in milliseconds, set when the session ends
    pub duration_ms: f64,
}

impl RecordingSession {
    /// Create a session with a fresh output path under `config.output_dir`
    pub fn new(config: &RecordingConfig, microphone_enabled: bool) -> Self {
        let id = Uuid::new_v4().to_string();
        let output_path = config
            .output_dir
            .join(format!("{}-{}.{}", config.file_prefix, id, FILE_EXTENSION));

        Self {
            id,
            output_path,
            microphone_enabled,
            microphone_active: false,
            started_at: Utc::now(),
            duration_ms: 0.0,
        }
    }

    /// Milliseconds since the session started
    pub fn elapsed_ms(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as f64
    }

    /// End the session
    pub fn end(&mut self, duration_ms: f64) {
        self.duration_ms = duration_ms;
    }
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("screen-replay")
}

fn default_file_prefix() -> String {
    "recording".to_string()
}

fn default_track_queue_capacity() -> usize {
    64
}

fn default_microphone_queue_capacity() -> usize {
    32
}

fn default_true() -> bool {
    true
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Directory receiving the temporary recording files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name prefix for recordings
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Queue capacity of each writer track
    #[serde(default = "default_track_queue_capacity")]
    pub track_queue_capacity: usize,

    /// Capacity of the microphone hand-off queue
    #[serde(default = "default_microphone_queue_capacity")]
    pub microphone_queue_capacity: usize,

    /// Microphone device ID (default input when unset)
    #[serde(default)]
    pub microphone_device_id: Option<String>,

    /// Maximum capture resolution
    #[serde(default)]
    pub video_quality: VideoQuality,

    /// Bitrate multiplier handed to the screen source
    #[serde(default)]
    pub custom_bitrate_factor: Option<f32>,

    /// Whether previews may be saved to the media library
    #[serde(default = "default_true")]
    pub allow_save_to_library: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            track_queue_capacity: default_track_queue_capacity(),
            microphone_queue_capacity: default_microphone_queue_capacity(),
            microphone_device_id: None,
            video_quality: VideoQuality::default(),
            custom_bitrate_factor: None,
            allow_save_to_library: true,
        }
    }
}

impl RecordingConfig {
    /// Load configuration from a JSON file; a missing file yields defaults
    pub fn load(path: &Path) -> RecorderResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: RecordingConfig = serde_json::from_str(&content)?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sessions_get_fresh_paths() {
        let config = RecordingConfig::default();
        let first = RecordingSession::new(&config, false);
        let second = RecordingSession::new(&config, true);

        assert_ne!(first.output_path, second.output_path);
        assert!(first.output_path.starts_with(&config.output_dir));
        assert_eq!(
            first.output_path.extension().and_then(|e| e.to_str()),
            Some(FILE_EXTENSION)
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("replay.json");
        std::fs::write(
            &path,
            r#"{ "videoQuality": "1080p", "allowSaveToLibrary": false, "microphoneDeviceId": "Built-in Microphone" }"#,
        )
        .unwrap();

        let config = RecordingConfig::load(&path).unwrap();
        assert_eq!(config.video_quality, VideoQuality::Quality1080p);
        assert!(!config.allow_save_to_library);
        assert_eq!(config.microphone_device_id.as_deref(), Some("Built-in Microphone"));
        assert_eq!(config.track_queue_capacity, 64);
        assert_eq!(config.file_prefix, "recording");
    }

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = RecordingConfig::load(&dir.path().join("absent.json")).unwrap();
        assert!(config.allow_save_to_library);
        assert_eq!(config.video_quality, VideoQuality::Quality720p);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(RecordingConfig::load(&path).is_err());
    }
}
