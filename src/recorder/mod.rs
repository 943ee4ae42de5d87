//! Recording system module
//!
//! - RecordingCoordinator drives the session lifecycle over the capture
//!   sources and the track writer
//! - State, session and configuration types

pub mod coordinator;
pub mod state;

pub use coordinator::{RecordingCoordinator, RecordingEvent};
pub use state::{RecordingConfig, RecordingSession, RecordingState};
