//! Microphone capture session
//!
//! Owns the live microphone pipeline: the device stream opened through a
//! [`MicrophoneBackend`], a bounded hand-off queue filled from the device
//! callback, and one delivery thread that forwards buffers, in arrival order,
//! to the writer's microphone track.

use super::adapters::SampleSink;
use super::clock::MediaClock;
use super::traits::{AudioDeviceInfo, AudioFormat, InputStreamHandle, MicrophoneBackend};
use crate::utils::error::{RecorderError, RecorderResult};
use crossbeam_channel::{bounded, Receiver, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

type Buffer = (i64, Vec<u8>);

/// Capture session controller for the microphone
pub struct MicrophoneCapture {
    backend: Arc<dyn MicrophoneBackend>,
    device_id: Option<String>,
    queue_capacity: usize,
    clock: MediaClock,
    stream: Option<Box<dyn InputStreamHandle>>,
    pending: Option<Receiver<Buffer>>,
    delivery: Option<JoinHandle<u64>>,
}

impl MicrophoneCapture {
    pub fn new(
        backend: Arc<dyn MicrophoneBackend>,
        device_id: Option<String>,
        queue_capacity: usize,
        clock: MediaClock,
    ) -> Self {
        Self {
            backend,
            device_id,
            queue_capacity: queue_capacity.max(1),
            clock,
            stream: None,
            pending: None,
            delivery: None,
        }
    }

    /// Enumerate input devices through the backend
    pub fn list_input_devices(&self) -> Vec<AudioDeviceInfo> {
        self.backend.input_devices()
    }

    /// Select the device used by the next `prepare`
    pub fn set_device(&mut self, device_id: Option<String>) {
        self.device_id = device_id;
    }

    pub fn is_prepared(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_capturing(&self) -> bool {
        self.delivery.is_some()
    }

    /// Format of the opened stream
    pub fn format(&self) -> Option<AudioFormat> {
        self.stream.as_ref().map(|s| s.format())
    }

    /// Open the input device as a paused stream. No-op when already open.
    pub fn prepare(&mut self) -> RecorderResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (tx, rx) = bounded::<Buffer>(self.queue_capacity);
        let clock = self.clock;
        let on_buffer = Box::new(move |data: Vec<u8>| {
            match tx.try_send((clock.now_us(), data)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::trace!("Microphone hand-off queue full, buffer dropped");
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        });

        let stream = self.backend.open(self.device_id.as_deref(), on_buffer)?;
        let format = stream.format();
        tracing::info!(
            "Microphone prepared: {} ({}Hz, {}ch)",
            self.device_id.as_deref().unwrap_or("default input"),
            format.sample_rate,
            format.channels
        );

        self.stream = Some(stream);
        self.pending = Some(rx);
        Ok(())
    }

    /// Start delivering microphone buffers to `sink`.
    ///
    /// Prepares the device first if needed. No-op when already capturing.
    pub fn start(&mut self, sink: SampleSink) -> RecorderResult<()> {
        if self.delivery.is_some() {
            tracing::debug!("Microphone capture already started");
            return Ok(());
        }

        self.prepare()?;

        let Some(rx) = self.pending.take() else {
            return Err(RecorderError::DeviceUnavailable(
                "microphone stream has no delivery queue".to_string(),
            ));
        };

        let delivery = std::thread::Builder::new()
            .name("microphone-delivery".to_string())
            .spawn(move || {
                let mut delivered = 0u64;
                for (pts_us, data) in rx.iter() {
                    if sink.post(pts_us, data).is_appended() {
                        delivered += 1;
                    }
                }
                delivered
            })?;
        self.delivery = Some(delivery);

        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.play() {
                tracing::warn!("Microphone stream failed to start: {}", e);
                self.stop();
                return Err(e);
            }
        }

        tracing::info!("Microphone capture started");
        Ok(())
    }

    /// Tear the pipeline down. Safe when not started.
    pub fn stop(&mut self) {
        let was_active = self.stream.is_some() || self.delivery.is_some();

        // Closing the stream drops the callback and with it the queue sender,
        // which ends the delivery loop once the queue is drained.
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.pending = None;

        if let Some(delivery) = self.delivery.take() {
            match delivery.join() {
                Ok(delivered) => {
                    tracing::debug!("Microphone delivered {} buffers", delivered)
                }
                Err(_) => tracing::warn!("Microphone delivery thread panicked"),
            }
        }

        if was_active {
            tracing::info!("Microphone capture stopped");
        }
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
