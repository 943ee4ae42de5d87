//! Microphone input through cpal
//!
//! cpal streams are not `Send` on every host, so each opened stream lives on
//! its own thread for its whole life; the handle talks to it over a command
//! channel.

use super::traits::{
    AudioBufferCallback, AudioDeviceInfo, AudioFormat, InputStreamHandle, MicrophoneBackend,
};
use crate::utils::error::{RecorderError, RecorderResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, unbounded, Sender};
use std::thread::JoinHandle;

/// Microphone backend on the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalMicrophone;

fn find_input_device(device_id: Option<&str>) -> Option<Device> {
    let host = cpal::default_host();
    match device_id {
        Some(id) => host
            .input_devices()
            .ok()?
            .find(|d| d.name().map(|name| name == id).unwrap_or(false)),
        None => host.default_input_device(),
    }
}

impl MicrophoneBackend for CpalMicrophone {
    fn input_devices(&self) -> Vec<AudioDeviceInfo> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        match host.input_devices() {
            Ok(devices) => devices
                .filter_map(|device| device.name().ok())
                .map(|name| AudioDeviceInfo {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    id: name.clone(),
                    name,
                    is_input: true,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate input devices: {}", e);
                Vec::new()
            }
        }
    }

    fn open(
        &self,
        device_id: Option<&str>,
        on_buffer: AudioBufferCallback,
    ) -> RecorderResult<Box<dyn InputStreamHandle>> {
        let (ready_tx, ready_rx) = bounded(1);
        let (commands, command_rx) = unbounded();
        let device_id = device_id.map(str::to_string);

        let thread = std::thread::Builder::new()
            .name("microphone-stream".to_string())
            .spawn(move || {
                let stream = match build_stream(device_id.as_deref(), on_buffer) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for command in command_rx.iter() {
                    match command {
                        StreamCommand::Play(reply) => {
                            let result = stream.play().map_err(|e| {
                                RecorderError::DeviceUnavailable(format!(
                                    "failed to start input stream: {}",
                                    e
                                ))
                            });
                            let _ = reply.send(result);
                        }
                        StreamCommand::Close => break,
                    }
                }

                if let Err(e) = stream.pause() {
                    tracing::debug!("Input stream pause on close failed: {}", e);
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(format)) => Ok(Box::new(CpalInputStream {
                format,
                commands,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(RecorderError::DeviceUnavailable(
                "input stream thread exited".to_string(),
            )),
        }
    }
}

fn build_stream(
    device_id: Option<&str>,
    on_buffer: AudioBufferCallback,
) -> RecorderResult<(cpal::Stream, AudioFormat)> {
    let device = find_input_device(device_id).ok_or_else(|| {
        RecorderError::DeviceUnavailable(format!(
            "no input device {}",
            device_id.unwrap_or("(default)")
        ))
    })?;

    let supported = device.default_input_config().map_err(|e| {
        RecorderError::DeviceUnavailable(format!("failed to get input config: {}", e))
    })?;

    let format = AudioFormat {
        sample_rate: supported.sample_rate().0,
        channels: supported.channels(),
    };
    let config = supported.config();

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_typed::<f32>(&device, &config, on_buffer),
        SampleFormat::I16 => build_typed::<i16>(&device, &config, on_buffer),
        SampleFormat::U16 => build_typed::<u16>(&device, &config, on_buffer),
        SampleFormat::I32 => build_typed::<i32>(&device, &config, on_buffer),
        other => Err(RecorderError::DeviceUnavailable(format!(
            "unsupported sample format {:?}",
            other
        ))),
    }?;

    Ok((stream, format))
}

/// Build a stream delivering little-endian f32 bytes whatever the device format
fn build_typed<T>(
    device: &Device,
    config: &StreamConfig,
    mut on_buffer: AudioBufferCallback,
) -> RecorderResult<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let bytes: Vec<u8> = data
                    .iter()
                    .flat_map(|&sample| f32::from_sample_(sample).to_le_bytes())
                    .collect();
                on_buffer(bytes);
            },
            |err| tracing::error!("Microphone stream error: {}", err),
            None,
        )
        .map_err(|e| RecorderError::DeviceUnavailable(format!("failed to build input stream: {}", e)))
}

enum StreamCommand {
    Play(Sender<RecorderResult<()>>),
    Close,
}

struct CpalInputStream {
    format: AudioFormat,
    commands: Sender<StreamCommand>,
    thread: Option<JoinHandle<()>>,
}

impl InputStreamHandle for CpalInputStream {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn play(&mut self) -> RecorderResult<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(StreamCommand::Play(reply_tx))
            .map_err(|_| RecorderError::DeviceUnavailable("input stream closed".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| RecorderError::DeviceUnavailable("input stream closed".to_string()))?
    }

    fn close(mut self: Box<Self>) {
        let _ = self.commands.send(StreamCommand::Close);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Microphone stream thread panicked");
            }
        }
    }
}
