//! Timer-driven screen source
//!
//! Produces test-pattern frames at a fixed rate with a buffer of silent
//! system audio bundled with each frame. Used where no platform capture
//! facility is wired in, and to exercise the engine end to end.

use super::adapters::ScreenSampleAdapter;
use super::traits::{CapturedAudio, CapturedFrame, ScreenCaptureOptions, ScreenCaptureSource};
use crate::utils::error::{RecorderError, RecorderResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const AUDIO_SAMPLE_RATE: u32 = 48_000;
const AUDIO_CHANNELS: u16 = 2;

/// Screen source that renders a moving test pattern
pub struct TimedScreenSource {
    id: String,
    fps: u32,
    frame_size: (u32, u32),
    available: bool,
    system_audio: bool,
    is_capturing: Arc<AtomicBool>,
    frames_delivered: Arc<AtomicU64>,
    capture_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TimedScreenSource {
    pub fn new(fps: u32) -> Self {
        Self {
            id: "timed-screen".to_string(),
            fps: fps.max(1),
            frame_size: (64, 36),
            available: true,
            system_audio: true,
            is_capturing: Arc::new(AtomicBool::new(false)),
            frames_delivered: Arc::new(AtomicU64::new(0)),
            capture_handle: None,
        }
    }

    /// Report the capture facility as missing
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Deliver frames without bundled system audio
    pub fn without_system_audio(mut self) -> Self {
        self.system_audio = false;
        self
    }

    /// Frames accepted by the writer since the last start
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }
}

fn test_pattern(width: u32, height: u32, frame_index: u64) -> Vec<u8> {
    let shade = (frame_index % 256) as u8;
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[x as u8 ^ shade, y as u8, shade, 0xFF]);
        }
    }
    data
}

#[async_trait]
impl ScreenCaptureSource for TimedScreenSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn start(
        &mut self,
        options: ScreenCaptureOptions,
        output: ScreenSampleAdapter,
    ) -> RecorderResult<()> {
        if !self.available {
            return Err(RecorderError::DeviceUnavailable(
                "screen capture is not available".to_string(),
            ));
        }

        if self.is_capturing.load(Ordering::SeqCst) {
            tracing::debug!("Screen source {} already capturing", self.id);
            return Ok(());
        }

        self.is_capturing.store(true, Ordering::SeqCst);
        self.frames_delivered.store(0, Ordering::Relaxed);

        let is_capturing = self.is_capturing.clone();
        let frames_delivered = self.frames_delivered.clone();
        let (width, height) = self.frame_size;
        let height = height.min(options.video_quality.max_height());
        let system_audio = self.system_audio;
        let fps = self.fps;
        let audio_frames_per_tick = (AUDIO_SAMPLE_RATE / fps) as usize;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
            let mut frame_index = 0u64;

            while is_capturing.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !is_capturing.load(Ordering::SeqCst) {
                    break;
                }

                let timestamp_us = output.clock().now_us();
                let frame = CapturedFrame {
                    data: test_pattern(width, height, frame_index),
                    width,
                    height,
                    timestamp_us,
                    bytes_per_row: width * 4,
                };
                if output.on_video_frame(frame).is_appended() {
                    frames_delivered.fetch_add(1, Ordering::Relaxed);
                }

                if system_audio {
                    let samples = audio_frames_per_tick * AUDIO_CHANNELS as usize;
                    output.on_system_audio(CapturedAudio {
                        data: vec![0u8; samples * 4],
                        sample_rate: AUDIO_SAMPLE_RATE,
                        channels: AUDIO_CHANNELS,
                        timestamp_us,
                    });
                }

                frame_index += 1;
            }

            tracing::info!("Screen source stopped after {} frames", frame_index);
        });

        self.capture_handle = Some(handle);
        tracing::info!(
            "Screen source {} started at {}fps ({}x{}, bitrate factor {:?})",
            self.id,
            fps,
            width,
            height,
            options.bitrate_factor
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecorderResult<()> {
        self.is_capturing.store(false, Ordering::SeqCst);

        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.await;
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }
}
