//! Preview and export
//!
//! Hands a finished recording to playback, the media library or a share
//! target.

pub mod gateway;
pub mod targets;
pub mod types;

pub use gateway::PreviewGateway;
pub use targets::{FolderLibrary, FolderShareTarget, SystemPlayer};
pub use types::{MediaLibrary, PreviewPlayer, ShareRequest, ShareTarget};
