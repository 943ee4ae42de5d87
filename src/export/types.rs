//! Preview/export collaborator types
//!
//! The playback, media-library and share mechanisms a finished recording is
//! handed to. They only ever see a file path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Request handed to a [`ShareTarget`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    /// Recording to share
    pub path: PathBuf,

    /// Message text accompanying the recording
    pub text: String,

    /// Subject line, for targets that have one
    pub subject: String,
}

/// Plays a recording
pub trait PreviewPlayer: Send + Sync {
    /// Launch playback of `path`. Returns once playback was launched.
    fn play(&self, path: &Path) -> anyhow::Result<()>;
}

/// Persists a recording into the user's media library
pub trait MediaLibrary: Send + Sync {
    /// Move `source` to `destination`; returns the final path
    fn save(&self, source: &Path, destination: &Path) -> anyhow::Result<PathBuf>;
}

/// Hands a recording to the platform share mechanism
pub trait ShareTarget: Send + Sync {
    fn share(&self, request: &ShareRequest) -> anyhow::Result<()>;
}
