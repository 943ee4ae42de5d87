//! Capture trait definitions
//!
//! Platform-agnostic types for media samples and the traits implemented by
//! the platform screen-capture facility and the microphone device layer.

use super::adapters::ScreenSampleAdapter;
use crate::utils::error::RecorderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One of the independent media streams multiplexed into a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    /// Screen video frames
    Video,
    /// Application/system audio delivered with the video frames
    SystemAudio,
    /// Microphone audio from the engine-owned capture pipeline
    Microphone,
}

impl TrackKind {
    /// All track kinds in container order
    pub const ALL: [TrackKind; 3] = [TrackKind::Video, TrackKind::SystemAudio, TrackKind::Microphone];

    /// Track id used in the container records
    pub fn id(&self) -> u8 {
        match self {
            TrackKind::Video => 1,
            TrackKind::SystemAudio => 2,
            TrackKind::Microphone => 3,
        }
    }

    /// Reverse of [`TrackKind::id`]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(TrackKind::Video),
            2 => Some(TrackKind::SystemAudio),
            3 => Some(TrackKind::Microphone),
            _ => None,
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            TrackKind::Video => 0,
            TrackKind::SystemAudio => 1,
            TrackKind::Microphone => 2,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::SystemAudio => write!(f, "system-audio"),
            TrackKind::Microphone => write!(f, "microphone"),
        }
    }
}

/// A timestamped buffer belonging to exactly one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSample {
    /// Track this sample belongs to
    pub track: TrackKind,

    /// Presentation timestamp in microseconds on the shared media clock
    pub pts_us: i64,

    /// Payload, opaque to the engine
    pub payload: Vec<u8>,
}

impl MediaSample {
    pub fn new(track: TrackKind, pts_us: i64, payload: Vec<u8>) -> Self {
        Self {
            track,
            pts_us,
            payload,
        }
    }

    pub fn video(pts_us: i64, payload: Vec<u8>) -> Self {
        Self::new(TrackKind::Video, pts_us, payload)
    }

    pub fn system_audio(pts_us: i64, payload: Vec<u8>) -> Self {
        Self::new(TrackKind::SystemAudio, pts_us, payload)
    }

    pub fn microphone(pts_us: i64, payload: Vec<u8>) -> Self {
        Self::new(TrackKind::Microphone, pts_us, payload)
    }
}

/// Frame data from a screen capture source
#[derive(Debug)]
pub struct CapturedFrame {
    /// Raw pixel data (BGRA format)
    pub data: Vec<u8>,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Timestamp in microseconds on the shared media clock
    pub timestamp_us: i64,

    /// Bytes per row (may include padding)
    pub bytes_per_row: u32,
}

/// Interleaved PCM buffer from an audio source
#[derive(Debug)]
pub struct CapturedAudio {
    /// Little-endian f32 samples
    pub data: Vec<u8>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u16,

    /// Timestamp in microseconds on the shared media clock
    pub timestamp_us: i64,
}

/// Maximum capture resolution requested from the screen source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoQuality {
    #[serde(rename = "480p")]
    Quality480p,
    #[serde(rename = "720p")]
    Quality720p,
    #[serde(rename = "1080p")]
    Quality1080p,
}

impl VideoQuality {
    /// Maximum frame height for this quality
    pub fn max_height(&self) -> u32 {
        match self {
            VideoQuality::Quality480p => 480,
            VideoQuality::Quality720p => 720,
            VideoQuality::Quality1080p => 1080,
        }
    }
}

impl Default for VideoQuality {
    fn default() -> Self {
        Self::Quality720p
    }
}

/// Options handed to the screen source when a recording starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenCaptureOptions {
    pub video_quality: VideoQuality,
    pub bitrate_factor: Option<f32>,
}

/// Information about an audio device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is an input device
    pub is_input: bool,

    /// Whether this is the default device
    pub is_default: bool,
}

/// Format of an opened input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// The OS screen-capture facility
///
/// Produces video frames with the system audio bundled in the same stream and
/// hands both to the [`ScreenSampleAdapter`] it is started with.
#[async_trait]
pub trait ScreenCaptureSource: Send + Sync {
    /// Source identifier used in logs
    fn id(&self) -> &str;

    /// Whether the capture facility exists on this device/OS version
    fn is_available(&self) -> bool;

    /// Start delivering frames and system audio to `output`
    async fn start(
        &mut self,
        options: ScreenCaptureOptions,
        output: ScreenSampleAdapter,
    ) -> RecorderResult<()>;

    /// Stop delivery. Safe to call when not capturing.
    async fn stop(&mut self) -> RecorderResult<()>;

    /// Whether the source is currently delivering
    fn is_capturing(&self) -> bool;
}

/// Receives raw input buffers from an opened microphone stream
pub type AudioBufferCallback = Box<dyn FnMut(Vec<u8>) + Send + 'static>;

/// An opened, initially paused, input stream
pub trait InputStreamHandle: Send {
    /// Format negotiated with the device
    fn format(&self) -> AudioFormat;

    /// Begin invoking the buffer callback
    fn play(&mut self) -> RecorderResult<()>;

    /// Stop the stream and release the device
    fn close(self: Box<Self>);
}

/// The microphone device layer
pub trait MicrophoneBackend: Send + Sync {
    /// Enumerate the available input devices
    fn input_devices(&self) -> Vec<AudioDeviceInfo>;

    /// Open `device_id` (or the default input) as a paused stream.
    ///
    /// Fails with `DeviceUnavailable` when no such input exists or the
    /// stream cannot be configured.
    fn open(
        &self,
        device_id: Option<&str>,
        on_buffer: AudioBufferCallback,
    ) -> RecorderResult<Box<dyn InputStreamHandle>>;
}

/// Backend used when no audio host is compiled in
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMicrophone;

impl MicrophoneBackend for NoMicrophone {
    fn input_devices(&self) -> Vec<AudioDeviceInfo> {
        Vec::new()
    }

    fn open(
        &self,
        _device_id: Option<&str>,
        _on_buffer: AudioBufferCallback,
    ) -> RecorderResult<Box<dyn InputStreamHandle>> {
        Err(crate::utils::error::RecorderError::DeviceUnavailable(
            "no audio input host available".to_string(),
        ))
    }
}
