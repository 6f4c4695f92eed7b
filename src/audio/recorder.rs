//! Microphone capture using CPAL
//!
//! The device is opened on a dedicated capture thread (CPAL streams are not
//! `Send` on every host). Each input callback buffer is converted to 16-bit
//! PCM and sent over a channel as one `audio/L16` segment. The returned
//! `CaptureHandle` stops the stream and joins the thread when released.

use std::sync::mpsc as std_mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use super::decoder::L16Params;
use super::wav::sample_to_pcm16;

/// Receives captured segments, in callback order.
pub type SegmentSender = UnboundedSender<Vec<u8>>;

/// Errors that can occur while acquiring an input device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("No audio input device found")]
    NoInputDevice,
    #[error("No supported audio configuration")]
    NoSupportedConfig,
    #[error("Failed to create audio stream: {0}")]
    StreamCreationFailed(String),
    #[error("Capture thread failed: {0}")]
    ThreadFailed(String),
}

/// Handle to an open input device.
/// Releasing (or dropping) it stops capture; releasing twice is a no-op.
pub struct CaptureHandle {
    mime_hint: String,
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl CaptureHandle {
    /// `stop` must stop delivery and drop the segment sender.
    pub fn new(mime_hint: impl Into<String>, stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            mime_hint: mime_hint.into(),
            stop: Some(Box::new(stop)),
        }
    }

    pub fn mime_hint(&self) -> &str {
        &self.mime_hint
    }

    pub fn is_released(&self) -> bool {
        self.stop.is_none()
    }

    pub fn release(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Source of live audio. May block while the platform asks the user for
/// permission.
pub trait AudioInput: Send + Sync + 'static {
    fn open(&self, segments: SegmentSender) -> Result<CaptureHandle, CaptureError>;
}

/// Default input device of the default CPAL host.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }

    /// Whether the host currently reports a default input device.
    pub fn is_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }
}

impl AudioInput for CpalMicrophone {
    fn open(&self, segments: SegmentSender) -> Result<CaptureHandle, CaptureError> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<L16Params, CaptureError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let lost_tx = stop_tx.clone();

        let join = thread::Builder::new()
            .name("voiceguard-capture".to_string())
            .spawn(move || {
                let stream = match open_default_stream(segments, lost_tx) {
                    Ok((stream, params)) => {
                        let _ = ready_tx.send(Ok(params));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Blocks until released, the handle is gone, or the device is lost.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("Capture thread: stream closed");
            })
            .map_err(|e| CaptureError::ThreadFailed(e.to_string()))?;

        let params = match ready_rx.recv() {
            Ok(Ok(params)) => params,
            Ok(Err(e)) => {
                let _ = join.join();
                return Err(e);
            }
            Err(_) => {
                let _ = join.join();
                return Err(CaptureError::ThreadFailed(
                    "capture thread exited before reporting".to_string(),
                ));
            }
        };

        log::info!(
            "Capture started: {} Hz, {} channels",
            params.rate,
            params.channels
        );

        Ok(CaptureHandle::new(params.mime(), move || {
            let _ = stop_tx.send(());
            if join.join().is_err() {
                log::error!("Capture thread panicked");
            }
            log::info!("Capture device released");
        }))
    }
}

fn open_default_stream(
    segments: SegmentSender,
    lost_tx: std_mpsc::Sender<()>,
) -> Result<(Stream, L16Params), CaptureError> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;

    log::info!("Using audio input device: {:?}", device.name());

    let supported_config = device
        .default_input_config()
        .map_err(|_| CaptureError::NoSupportedConfig)?;

    log::info!(
        "Audio config: {} Hz, {} channels, {:?}",
        supported_config.sample_rate().0,
        supported_config.channels(),
        supported_config.sample_format()
    );

    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();
    let params = L16Params {
        rate: config.sample_rate.0,
        channels: config.channels,
    };

    let stream = build_stream(&device, &config, sample_format, segments, lost_tx)?;
    stream
        .play()
        .map_err(|e| CaptureError::StreamCreationFailed(format!("Failed to start stream: {}", e)))?;

    Ok((stream, params))
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    segments: SegmentSender,
    lost_tx: std_mpsc::Sender<()>,
) -> Result<Stream, CaptureError> {
    // Stopping the stream drops the segment sender, which the session sees
    let err_fn = move |err: cpal::StreamError| {
        log::error!("Audio stream error: {}", err);
        if is_device_lost(&err) {
            let _ = lost_tx.send(());
        }
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                forward_segment(&segments, data.iter().map(|&s| sample_to_pcm16(s)));
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                forward_segment(&segments, data.iter().copied());
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                forward_segment(&segments, data.iter().map(|&s| u16_to_i16(s)));
            },
            err_fn,
            None,
        ),
        _ => return Err(CaptureError::NoSupportedConfig),
    };

    stream.map_err(|e| CaptureError::StreamCreationFailed(e.to_string()))
}

/// Stream errors after which no more audio will arrive.
fn is_device_lost(err: &cpal::StreamError) -> bool {
    matches!(err, cpal::StreamError::DeviceNotAvailable)
}

fn forward_segment(segments: &SegmentSender, samples: impl Iterator<Item = i16>) {
    let bytes = encode_l16(samples);
    if bytes.is_empty() {
        return;
    }
    // The receiver is gone once the session released the device.
    let _ = segments.send(bytes);
}

/// Big-endian 16-bit PCM, as `audio/L16` requires.
fn encode_l16(samples: impl Iterator<Item = i16>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.size_hint().0 * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_be_bytes());
    }
    bytes
}

fn u16_to_i16(sample: u16) -> i16 {
    (sample as i32 - 32768) as i16
}
