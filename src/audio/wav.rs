//! Canonical WAV container and base64 transfer encoding.
//!
//! Every payload sent to the detection service is a 16-bit PCM WAV built here
//! from decoded samples. The output is a pure function of the input.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::decoded::{DecodedAudio, TranscodeError};

/// Size of the RIFF/WAVE header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u32 = 2;

/// Format fields of the `fmt ` chunk, checked to fit their widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
}

impl WavFormat {
    /// PCM16 format for `channels` at `sample_rate`.
    ///
    /// Fails when `sample_rate * channels * 2` or `channels * 2` would not
    /// fit the 32-bit and 16-bit header fields.
    pub fn pcm16(channels: u16, sample_rate: u32) -> Result<Self, TranscodeError> {
        let block_align = u64::from(channels) * u64::from(BYTES_PER_SAMPLE);
        let byte_rate = u64::from(sample_rate) * block_align;

        let block_align = u16::try_from(block_align).map_err(|_| {
            TranscodeError::InvalidLayout(format!(
                "{} channels do not fit a 16-bit block align",
                channels
            ))
        })?;
        let byte_rate = u32::try_from(byte_rate).map_err(|_| {
            TranscodeError::InvalidLayout(format!(
                "{} Hz with {} channels does not fit a 32-bit byte rate",
                sample_rate, channels
            ))
        })?;

        Ok(Self {
            channels,
            sample_rate,
            byte_rate,
            block_align,
        })
    }
}

/// Write the 44-byte PCM header into `buf[..44]`.
///
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16
/// [20-21]  1 (PCM)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  sample_rate * channels * 2
/// [32-33]  channels * 2
/// [34-35]  16
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
///
/// `data_size` must be at most `u32::MAX - 36`.
pub fn write_header(buf: &mut [u8], format: &WavFormat, data_size: u32) {
    buf[0..4].copy_from_slice(b"RIFF");
    buf[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    buf[8..12].copy_from_slice(b"WAVE");

    buf[12..16].copy_from_slice(b"fmt ");
    buf[16..20].copy_from_slice(&16u32.to_le_bytes());
    buf[20..22].copy_from_slice(&1u16.to_le_bytes());
    buf[22..24].copy_from_slice(&format.channels.to_le_bytes());
    buf[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    buf[28..32].copy_from_slice(&format.byte_rate.to_le_bytes());
    buf[32..34].copy_from_slice(&format.block_align.to_le_bytes());
    buf[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    buf[36..40].copy_from_slice(b"data");
    buf[40..44].copy_from_slice(&data_size.to_le_bytes());
}

/// Convert one float sample to signed 16-bit PCM.
///
/// Negative values scale by 32768 and non-negative values by 32767 so that
/// -1.0 and 1.0 land exactly on `i16::MIN` and `i16::MAX`. The product is
/// truncated toward zero. NaN encodes as silence.
pub fn sample_to_pcm16(sample: f32) -> i16 {
    let s = f64::from(sample);
    if s.is_nan() {
        return 0;
    }
    let s = s.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled as i16
}

/// Encode decoded audio as a canonical WAV byte buffer.
pub fn encode_wav(audio: &DecodedAudio) -> Result<Vec<u8>, TranscodeError> {
    let channels = audio.channel_count();
    let format = WavFormat::pcm16(channels, audio.sample_rate_hz())?;
    let frames = audio.samples_per_channel() as u64;
    let data_size = frames * channels as u64 * BYTES_PER_SAMPLE as u64;

    // The RIFF size field stores 36 + data_size.
    if data_size > (u32::MAX - 36) as u64 {
        return Err(TranscodeError::PayloadTooLarge { bytes: data_size });
    }
    let data_size = data_size as u32;

    let mut buf = vec![0u8; WAV_HEADER_SIZE + data_size as usize];
    write_header(&mut buf, &format, data_size);

    let planes = audio.channels();
    let mut offset = WAV_HEADER_SIZE;
    for i in 0..frames as usize {
        for plane in planes {
            let pcm = sample_to_pcm16(plane[i]);
            buf[offset..offset + 2].copy_from_slice(&pcm.to_le_bytes());
            offset += 2;
        }
    }

    Ok(buf)
}

/// Base64 (standard alphabet, padded, single line).
pub fn to_transfer_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Encode `audio` as WAV and return its transfer text.
pub fn canonical_payload(audio: &DecodedAudio) -> Result<String, TranscodeError> {
    let wav = encode_wav(audio)?;
    Ok(to_transfer_text(&wav))
}
