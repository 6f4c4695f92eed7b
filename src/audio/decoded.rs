//! Decoded PCM audio and the errors raised while producing or encoding it.

use thiserror::Error;

/// Errors that can occur while turning source bytes into a canonical payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    /// The decoder could not parse the byte stream as audio.
    #[error("Could not decode audio: {reason}")]
    Decode { reason: String },

    /// Decoder output did not describe a usable channel layout.
    #[error("Invalid audio layout: {0}")]
    InvalidLayout(String),

    /// The canonical container would not fit the 32-bit RIFF size fields.
    #[error("Audio is too long to encode as WAV ({bytes} bytes of PCM)")]
    PayloadTooLarge { bytes: u64 },
}

impl TranscodeError {
    pub fn decode(reason: impl Into<String>) -> Self {
        TranscodeError::Decode {
            reason: reason.into(),
        }
    }
}

/// Planar floating-point audio as produced by a decoder.
///
/// Every channel holds the same number of samples. Values are nominally in
/// `[-1.0, 1.0]`; the WAV encoder clamps anything outside that range.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    sample_rate_hz: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// Build from one sample vector per channel.
    pub fn new(sample_rate_hz: u32, channels: Vec<Vec<f32>>) -> Result<Self, TranscodeError> {
        if channels.is_empty() {
            return Err(TranscodeError::InvalidLayout("no channels".to_string()));
        }
        if channels.len() > u16::MAX as usize {
            return Err(TranscodeError::InvalidLayout(format!(
                "{} channels exceeds the WAV limit",
                channels.len()
            )));
        }
        if sample_rate_hz == 0 {
            return Err(TranscodeError::InvalidLayout(
                "sample rate is zero".to_string(),
            ));
        }

        let frames = channels[0].len();
        if let Some((idx, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != frames)
        {
            return Err(TranscodeError::InvalidLayout(format!(
                "channel {} has {} samples, expected {}",
                idx,
                ch.len(),
                frames
            )));
        }

        Ok(Self {
            sample_rate_hz,
            channels,
        })
    }

    /// Build from frame-interleaved samples (`[l0, r0, l1, r1, ...]`).
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(
        sample_rate_hz: u32,
        channel_count: usize,
        interleaved: &[f32],
    ) -> Result<Self, TranscodeError> {
        if channel_count == 0 {
            return Err(TranscodeError::InvalidLayout("no channels".to_string()));
        }
        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }
        Self::new(sample_rate_hz, channels)
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Number of samples in each channel.
    pub fn samples_per_channel(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.samples_per_channel() as u64 * 1000) / self.sample_rate_hz as u64
    }
}
