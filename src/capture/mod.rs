//! Capture sources
//!
//! Sample types, the traits implemented by platform capture facilities, the
//! adapters that route their buffers into the writer, and the microphone
//! capture session.

pub mod adapters;
pub mod clock;
pub mod microphone;
pub mod synthetic;
pub mod traits;

#[cfg(feature = "cpal")]
pub mod cpal_input;

pub use adapters::{SampleSink, ScreenSampleAdapter};
pub use clock::MediaClock;
pub use microphone::MicrophoneCapture;
pub use synthetic::TimedScreenSource;
pub use traits::{
    AudioDeviceInfo, CapturedAudio, CapturedFrame, MediaSample, MicrophoneBackend, NoMicrophone,
    ScreenCaptureOptions, ScreenCaptureSource, TrackKind, VideoQuality,
};

#[cfg(feature = "cpal")]
pub use cpal_input::CpalMicrophone;

/// Microphone backend for the compiled-in audio host
pub fn default_microphone_backend() -> std::sync::Arc<dyn MicrophoneBackend> {
    #[cfg(feature = "cpal")]
    {
        std::sync::Arc::new(CpalMicrophone)
    }

    #[cfg(not(feature = "cpal"))]
    {
        std::sync::Arc::new(NoMicrophone)
    }
}
