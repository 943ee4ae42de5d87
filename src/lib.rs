//! Screen Replay - screen and session recording engine.
//!
//! Captures on-screen video with its system audio and, optionally, the
//! microphone, multiplexes the streams into a single time-synchronized
//! container, and hands the finished recording to preview, save and share.

pub mod capture;
pub mod commands;
pub mod export;
pub mod muxer;
pub mod recorder;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::RecorderState;
pub use export::PreviewGateway;
pub use muxer::PreviewArtifact;
pub use recorder::{RecordingConfig, RecordingCoordinator, RecordingEvent, RecordingState};
pub use utils::{ErrorResponse, RecorderError, RecorderResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// Honors `RUST_LOG`; defaults to debug output for this crate. Calling it
/// again once a subscriber is installed does nothing.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_replay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting Screen Replay v{}", env!("CARGO_PKG_VERSION"));
    }
}
