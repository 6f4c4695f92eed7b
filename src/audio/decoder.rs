//! Audio decoding: container/codec bytes → planar f32 samples.
//!
//! Uploads go through symphonia's probe, hinted with the declared media type
//! and file extension. Live captures arrive as raw `audio/L16` and are
//! decoded directly, since a headerless stream cannot be probed.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::decoded::{DecodedAudio, TranscodeError};
use crate::source::AudioSource;

/// Anything that can decode a pending source into samples.
pub trait AudioDecoder: Send + Sync + 'static {
    fn decode(&self, source: &AudioSource) -> Result<DecodedAudio, TranscodeError>;
}

/// Raw PCM layout carried in an `audio/L16` media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L16Params {
    pub rate: u32,
    pub channels: u16,
}

impl L16Params {
    /// Media type string for a raw capture stream.
    pub fn mime(&self) -> String {
        format!("audio/L16; rate={}; channels={}", self.rate, self.channels)
    }
}

/// Parse `audio/L16; rate=48000; channels=2`. `channels` defaults to 1;
/// `rate` is required.
pub fn parse_l16(media_type: &str) -> Option<L16Params> {
    let mut parts = media_type.split(';').map(str::trim);
    let essence = parts.next()?;
    if !essence.eq_ignore_ascii_case("audio/l16") {
        return None;
    }

    let mut rate = None;
    let mut channels = 1u16;
    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => rate = value.parse().ok(),
            "channels" => channels = value.parse().ok()?,
            _ => {}
        }
    }

    Some(L16Params {
        rate: rate?,
        channels,
    })
}

/// Decode big-endian interleaved 16-bit PCM. A trailing partial frame is
/// dropped.
pub fn decode_l16(bytes: &[u8], params: L16Params) -> Result<DecodedAudio, TranscodeError> {
    if params.channels == 0 || params.rate == 0 {
        return Err(TranscodeError::decode(format!(
            "invalid L16 parameters: rate={} channels={}",
            params.rate, params.channels
        )));
    }

    let frame_bytes = params.channels as usize * 2;
    let remainder = bytes.len() % frame_bytes;
    if remainder != 0 {
        log::warn!(
            "L16 stream has {} trailing bytes (frame size {}), dropping partial frame",
            remainder,
            frame_bytes
        );
    }

    let interleaved: Vec<f32> = bytes[..bytes.len() - remainder]
        .chunks_exact(2)
        .map(|b| i16::from_be_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();

    if interleaved.is_empty() {
        return Err(TranscodeError::decode("no audio samples decoded"));
    }

    DecodedAudio::from_interleaved(params.rate, params.channels as usize, &interleaved)
}

/// Decoder backed by symphonia's default codec and format registries.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_container(
        &self,
        bytes: std::sync::Arc<[u8]>,
        media_type: &str,
        name: Option<&str>,
    ) -> Result<DecodedAudio, TranscodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(essence) = media_type.split(';').next().map(str::trim) {
            if !essence.is_empty() {
                hint.mime_type(essence);
            }
        }
        if let Some(ext) = name.and_then(|n| Path::new(n).extension()).and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| TranscodeError::decode(format!("probe: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| TranscodeError::decode("no audio track found"))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| TranscodeError::decode(format!("codec: {}", e)))?;

        let mut sample_rate = codec_params.sample_rate;
        let mut channels: Vec<Vec<f32>> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(TranscodeError::decode(format!("packet: {}", e))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping corrupt audio frame: {}", e);
                    continue;
                }
                Err(e) => return Err(TranscodeError::decode(format!("decode: {}", e))),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let channel_count = spec.channels.count();
            if channels.is_empty() {
                channels = vec![Vec::new(); channel_count];
                sample_rate = Some(spec.rate);
            } else if channels.len() != channel_count {
                return Err(TranscodeError::decode(format!(
                    "channel count changed mid-stream ({} -> {})",
                    channels.len(),
                    channel_count
                )));
            }

            let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            for frame in sample_buf.samples().chunks_exact(channel_count) {
                for (ch, &sample) in frame.iter().enumerate() {
                    channels[ch].push(sample);
                }
            }
        }

        if channels.is_empty() || channels[0].is_empty() {
            return Err(TranscodeError::decode("no audio samples decoded"));
        }

        let sample_rate = sample_rate.ok_or_else(|| TranscodeError::decode("unknown sample rate"))?;
        DecodedAudio::new(sample_rate, channels)
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, source: &AudioSource) -> Result<DecodedAudio, TranscodeError> {
        if let Some(params) = parse_l16(source.media_type()) {
            return decode_l16(source.bytes(), params);
        }
        self.decode_container(
            source.shared_bytes(),
            source.media_type(),
            source.display_name(),
        )
    }
}
