//! Test doubles for the external collaborators

use crate::capture::adapters::ScreenSampleAdapter;
use crate::capture::traits::{
    AudioBufferCallback, AudioDeviceInfo, AudioFormat, InputStreamHandle, MicrophoneBackend,
    ScreenCaptureOptions, ScreenCaptureSource,
};
use crate::export::types::{PreviewPlayer, ShareRequest, ShareTarget};
use crate::utils::error::{RecorderError, RecorderResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type CallbackSlot = Arc<Mutex<Option<AudioBufferCallback>>>;

/// Microphone backend driven by the test through [`FakeMicrophone::emit`]
pub struct FakeMicrophone {
    denied: bool,
    refuse_play: bool,
    slot: CallbackSlot,
    playing: Arc<AtomicBool>,
}

impl FakeMicrophone {
    /// Backend exposing a single "default" input
    pub fn available() -> Self {
        Self {
            denied: false,
            refuse_play: false,
            slot: Arc::new(Mutex::new(None)),
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Backend whose device refuses to open
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::available()
        }
    }

    /// Backend whose device opens but whose stream refuses to start
    pub fn play_denied() -> Self {
        Self {
            refuse_play: true,
            ..Self::available()
        }
    }

    /// Push a buffer through the open stream, if it is playing
    pub fn emit(&self, data: Vec<u8>) {
        if !self.playing.load(Ordering::SeqCst) {
            return;
        }
        if let Some(callback) = self.slot.lock().as_mut() {
            callback(data);
        }
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl MicrophoneBackend for FakeMicrophone {
    fn input_devices(&self) -> Vec<AudioDeviceInfo> {
        vec![AudioDeviceInfo {
            id: "default".to_string(),
            name: "Fake Microphone".to_string(),
            is_input: true,
            is_default: true,
        }]
    }

    fn open(
        &self,
        device_id: Option<&str>,
        on_buffer: AudioBufferCallback,
    ) -> RecorderResult<Box<dyn InputStreamHandle>> {
        if self.denied {
            return Err(RecorderError::DeviceUnavailable(
                "microphone access denied".to_string(),
            ));
        }
        if device_id.is_some_and(|id| id != "default") {
            return Err(RecorderError::DeviceUnavailable(format!(
                "no input device {}",
                device_id.unwrap_or_default()
            )));
        }

        *self.slot.lock() = Some(on_buffer);
        Ok(Box::new(FakeStream {
            refuse_play: self.refuse_play,
            slot: self.slot.clone(),
            playing: self.playing.clone(),
        }))
    }
}

struct FakeStream {
    refuse_play: bool,
    slot: CallbackSlot,
    playing: Arc<AtomicBool>,
}

impl InputStreamHandle for FakeStream {
    fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: 48_000,
            channels: 1,
        }
    }

    fn play(&mut self) -> RecorderResult<()> {
        if self.refuse_play {
            return Err(RecorderError::DeviceUnavailable(
                "microphone stream refused to start".to_string(),
            ));
        }
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(self: Box<Self>) {
        self.playing.store(false, Ordering::SeqCst);
        self.slot.lock().take();
    }
}

/// Screen source that is available but whose start always fails
#[derive(Default)]
pub struct BrokenScreenSource;

#[async_trait]
impl ScreenCaptureSource for BrokenScreenSource {
    fn id(&self) -> &str {
        "broken-screen"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn start(
        &mut self,
        _options: ScreenCaptureOptions,
        _output: ScreenSampleAdapter,
    ) -> RecorderResult<()> {
        Err(RecorderError::DeviceUnavailable(
            "capture session refused to start".to_string(),
        ))
    }

    async fn stop(&mut self) -> RecorderResult<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }
}

/// Player that records what it was asked to play
#[derive(Default)]
pub struct RecordingPlayer {
    fail: bool,
    played: Mutex<Vec<PathBuf>>,
}

impl RecordingPlayer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().clone()
    }
}

impl PreviewPlayer for RecordingPlayer {
    fn play(&self, path: &Path) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("no player installed");
        }
        self.played.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Share target that refuses every request
#[derive(Default)]
pub struct RejectingShareTarget;

impl ShareTarget for RejectingShareTarget {
    fn share(&self, _request: &ShareRequest) -> anyhow::Result<()> {
        anyhow::bail!("share sheet dismissed")
    }
}
