//! Source bytes → canonical WAV → transfer text.

use std::sync::Arc;

use super::decoded::{DecodedAudio, TranscodeError};
use super::decoder::{AudioDecoder, SymphoniaDecoder};
use super::wav;
use crate::source::AudioSource;

/// Normalizes any decodable source into the canonical payload the
/// detection service expects.
#[derive(Clone)]
pub struct AudioTranscoder {
    decoder: Arc<dyn AudioDecoder>,
}

impl Default for AudioTranscoder {
    fn default() -> Self {
        Self::new(Arc::new(SymphoniaDecoder::new()))
    }
}

impl AudioTranscoder {
    pub fn new(decoder: Arc<dyn AudioDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode `source` and return base64 of its canonical WAV encoding.
    ///
    /// CPU-bound; call from a blocking context.
    pub fn to_canonical_payload(&self, source: &AudioSource) -> Result<String, TranscodeError> {
        let decoded = self.decoder.decode(source)?;
        log::info!(
            "Decoded {} source: {} ch, {} Hz, {} samples/ch ({} ms)",
            source.kind(),
            decoded.channel_count(),
            decoded.sample_rate_hz(),
            decoded.samples_per_channel(),
            decoded.duration_ms()
        );
        Self::encode(&decoded)
    }

    /// Canonical payload for already-decoded audio.
    pub fn encode(decoded: &DecodedAudio) -> Result<String, TranscodeError> {
        let wav = wav::encode_wav(decoded)?;
        log::debug!("Canonical WAV: {} bytes", wav.len());
        Ok(wav::to_transfer_text(&wav))
    }
}
