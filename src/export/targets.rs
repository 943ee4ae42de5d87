//! Default export collaborators
//!
//! File-system backed library and share outbox, and a player that hands the
//! recording to the OS opener.

use super::types::{MediaLibrary, PreviewPlayer, ShareRequest, ShareTarget};
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Move a file, falling back to copy + remove across file systems
pub(crate) fn move_file(source: &Path, destination: &Path) -> anyhow::Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    std::fs::copy(source, destination)
        .with_context(|| format!("Failed to copy {:?} to {:?}", source, destination))?;
    if let Err(e) = std::fs::remove_file(source) {
        tracing::warn!("Copied {:?} but could not remove the original: {}", source, e);
    }
    Ok(())
}

fn file_name(path: &Path) -> anyhow::Result<&std::ffi::OsStr> {
    path.file_name()
        .ok_or_else(|| anyhow!("{:?} has no file name", path))
}

/// Opens recordings with the OS default application
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPlayer;

impl PreviewPlayer for SystemPlayer {
    fn play(&self, path: &Path) -> anyhow::Result<()> {
        #[cfg(target_os = "macos")]
        let mut command = {
            let mut command = Command::new("open");
            command.arg(path);
            command
        };

        #[cfg(target_os = "windows")]
        let mut command = {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]).arg(path);
            command
        };

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let mut command = {
            let mut command = Command::new("xdg-open");
            command.arg(path);
            command
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch player for {:?}", path))?;
        Ok(())
    }
}

/// Media library rooted at a directory
///
/// Relative destinations resolve under the root; a destination that is an
/// existing directory receives the recording under its own file name.
#[derive(Debug, Clone)]
pub struct FolderLibrary {
    root: PathBuf,
}

impl FolderLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, source: &Path, destination: &Path) -> anyhow::Result<PathBuf> {
        let target = if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            self.root.join(destination)
        };

        if target.is_dir() {
            Ok(target.join(file_name(source)?))
        } else {
            Ok(target)
        }
    }
}

impl Default for FolderLibrary {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("screen-replay").join("library"))
    }
}

impl MediaLibrary for FolderLibrary {
    fn save(&self, source: &Path, destination: &Path) -> anyhow::Result<PathBuf> {
        let target = self.resolve(source, destination)?;
        if target.exists() {
            return Err(anyhow!("{:?} already exists", target));
        }

        move_file(source, &target)?;
        tracing::info!("Saved {:?} to library at {:?}", source, target);
        Ok(target)
    }
}

/// Share target that drops the recording and a JSON sidecar holding the
/// text and subject into an outbox directory
#[derive(Debug, Clone)]
pub struct FolderShareTarget {
    outbox: PathBuf,
}

impl FolderShareTarget {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }
}

impl Default for FolderShareTarget {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("screen-replay").join("outbox"))
    }
}

impl ShareTarget for FolderShareTarget {
    fn share(&self, request: &ShareRequest) -> anyhow::Result<()> {
        let name = file_name(&request.path)?;
        let shared = self.outbox.join(name);
        move_file(&request.path, &shared)?;

        let sidecar = ShareRequest {
            path: shared.clone(),
            text: request.text.clone(),
            subject: request.subject.clone(),
        };
        let mut sidecar_name = name.to_os_string();
        sidecar_name.push(".share.json");
        let content = serde_json::to_string_pretty(&sidecar)?;
        std::fs::write(self.outbox.join(sidecar_name), content)
            .context("Failed to write share sidecar")?;

        tracing::info!("Shared {:?} via outbox {:?}", shared, self.outbox);
        Ok(())
    }
}
