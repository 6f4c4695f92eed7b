//! Audio module for VoiceGuard
//!
//! Microphone capture, decoding of recorded or uploaded audio, and the
//! canonical WAV/base64 payload sent to the detection service.
//! Uses CPAL for capture and symphonia for decoding.

mod decoded;
pub mod decoder;
pub mod recorder;
mod transcoder;
pub mod wav;

pub use decoded::{DecodedAudio, TranscodeError};
pub use decoder::{AudioDecoder, SymphoniaDecoder};
pub use recorder::{AudioInput, CaptureError, CaptureHandle, CpalMicrophone, SegmentSender};
pub use transcoder::AudioTranscoder;
