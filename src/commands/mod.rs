//! Host command handlers
//!
//! The functions a host application (UI layer, plugin bridge) calls into.
//! Each takes the shared [`recording::RecorderState`] and reports failures as
//! plain messages.

pub mod recording;

pub use recording::RecorderState;
