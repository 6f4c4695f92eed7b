//! Wire types for the detection service and the normalized outcome types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::{CaptureError, TranscodeError};

/// The only audio format this client ever sends.
pub const AUDIO_FORMAT_WAV: &str = "wav";

/// Classifier label for human speech. Every other label means AI-generated.
pub const PREDICTION_HUMAN: &str = "HUMAN";

/// Request body for `POST /api/detect-voice`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectionRequest {
    pub language: String,
    pub audio_format: String,
    pub audio_base64: String,
}

impl DetectionRequest {
    pub fn wav(language_hint: &str, audio_base64: String) -> Self {
        Self {
            language: language_hint.to_string(),
            audio_format: AUDIO_FORMAT_WAV.to_string(),
            audio_base64,
        }
    }
}

/// Success body from the service.
#[derive(Debug, Deserialize)]
pub(crate) struct WireResponse {
    pub prediction: String,
    #[serde(default)]
    pub confidence: Value,
    #[serde(default)]
    pub language: Option<String>,
}

/// Error body from the service (FastAPI style).
#[derive(Debug, Deserialize)]
pub(crate) struct WireErrorBody {
    pub detail: String,
}

/// Health body from `GET /api/health`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireHealth {
    pub status: String,
}

/// Classifier confidence: a whole percentage when the service sent a number,
/// otherwise the service's own text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Confidence {
    Percent(u8),
    Opaque(String),
}

impl Confidence {
    /// Numbers are fractions in `[0, 1]`, rounded to the nearest percent.
    pub fn from_wire(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(fraction) => Confidence::Percent(fraction_to_percent(fraction)),
                None => Confidence::Opaque(n.to_string()),
            },
            Value::String(s) => Confidence::Opaque(s.clone()),
            Value::Null => Confidence::Opaque(String::new()),
            other => Confidence::Opaque(other.to_string()),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Percent(p) => write!(f, "{}%", p),
            Confidence::Opaque(s) => write!(f, "{}", s),
        }
    }
}

fn fraction_to_percent(fraction: f64) -> u8 {
    let percent = (fraction * 100.0).round();
    if percent.is_nan() {
        return 0;
    }
    percent.clamp(0.0, 100.0) as u8
}

/// Normalized classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub language: String,
    pub is_human: bool,
    pub confidence: Confidence,
}

impl DetectionResult {
    pub(crate) fn from_wire(wire: WireResponse) -> Self {
        Self {
            language: wire.language.unwrap_or_default(),
            is_human: wire.prediction == PREDICTION_HUMAN,
            confidence: Confidence::from_wire(&wire.confidence),
        }
    }

    /// Whole percentage, when the service sent a numeric confidence.
    pub fn confidence_percent(&self) -> Option<u8> {
        match self.confidence {
            Confidence::Percent(p) => Some(p),
            Confidence::Opaque(_) => None,
        }
    }
}

/// What the result view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentedResult {
    pub language: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub confidence: String,
}

impl From<&DetectionResult> for PresentedResult {
    fn from(result: &DetectionResult) -> Self {
        let language = if result.language.trim().is_empty() {
            "—".to_string()
        } else {
            result.language.clone()
        };
        let kind = if result.is_human {
            "Human"
        } else {
            "AI-generated"
        };
        Self {
            language,
            kind: kind.to_string(),
            confidence: result.confidence.to_string(),
        }
    }
}

/// Failure categories surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// No microphone, or permission denied.
    DeviceUnavailable,
    /// Selected file is not audio.
    InvalidMediaType,
    /// Audio bytes could not be decoded or encoded.
    DecodeFailure,
    /// The service answered with an error.
    RemoteError,
    /// No response reached us.
    ConnectivityError,
}

/// A terminal failure for the current capture or submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct DetectionFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl DetectionFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteError, message)
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectivityError, message)
    }
}

impl From<CaptureError> for DetectionFailure {
    fn from(err: CaptureError) -> Self {
        DetectionFailure::new(
            ErrorKind::DeviceUnavailable,
            format!("Microphone access is needed to record: {}", err),
        )
    }
}

impl From<TranscodeError> for DetectionFailure {
    fn from(err: TranscodeError) -> Self {
        DetectionFailure::new(ErrorKind::DecodeFailure, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_from(body: Value) -> DetectionResult {
        DetectionResult::from_wire(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn human_prediction_maps_to_human() {
        let result = result_from(json!({"prediction": "HUMAN", "confidence": 0.93, "language": "English"}));
        assert!(result.is_human);
        assert_eq!(result.confidence_percent(), Some(93));
        assert_eq!(result.language, "English");
    }

    #[test]
    fn any_other_prediction_is_ai_generated() {
        let result = result_from(json!({"prediction": "AI", "confidence": 0.5001}));
        assert!(!result.is_human);
        assert_eq!(result.confidence_percent(), Some(50));

        let result = result_from(json!({"prediction": "AI_GENERATED", "confidence": 1}));
        assert!(!result.is_human);
        assert_eq!(result.confidence_percent(), Some(100));

        // Case matters
        assert!(!result_from(json!({"prediction": "human", "confidence": 0.9})).is_human);
    }

    #[test]
    fn rounding_is_to_nearest() {
        assert_eq!(Confidence::from_wire(&json!(0.125)), Confidence::Percent(13));
        assert_eq!(Confidence::from_wire(&json!(0.124)), Confidence::Percent(12));
        assert_eq!(Confidence::from_wire(&json!(0)), Confidence::Percent(0));
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        assert_eq!(Confidence::from_wire(&json!(1.7)), Confidence::Percent(100));
        assert_eq!(Confidence::from_wire(&json!(-0.2)), Confidence::Percent(0));
    }

    #[test]
    fn non_numeric_confidence_passes_through() {
        assert_eq!(
            Confidence::from_wire(&json!("high")),
            Confidence::Opaque("high".to_string())
        );
        let result = result_from(json!({"prediction": "HUMAN", "confidence": "high"}));
        assert_eq!(result.confidence_percent(), None);
        assert_eq!(result.confidence.to_string(), "high");
    }

    #[test]
    fn presented_result_matches_view_contract() {
        let result = result_from(json!({"prediction": "HUMAN", "confidence": 0.93, "language": "Hindi (Devanagari)"}));
        let view = PresentedResult::from(&result);
        assert_eq!(view.language, "Hindi (Devanagari)");
        assert_eq!(view.kind, "Human");
        assert_eq!(view.confidence, "93%");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "Human");
    }

    #[test]
    fn presented_result_placeholder_language() {
        let result = result_from(json!({"prediction": "AI_GENERATED", "confidence": 0.6}));
        let view = PresentedResult::from(&result);
        assert_eq!(view.language, "—");
        assert_eq!(view.kind, "AI-generated");
        assert_eq!(view.confidence, "60%");
    }

    #[test]
    fn request_serializes_wire_field_names() {
        let req = DetectionRequest::wav("en", "UklGRg==".to_string());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            json!({"language": "en", "audio_format": "wav", "audio_base64": "UklGRg=="})
        );
    }

    #[test]
    fn failures_convert_with_kinds() {
        let f: DetectionFailure = CaptureError::NoInputDevice.into();
        assert_eq!(f.kind, ErrorKind::DeviceUnavailable);
        assert!(f.message.contains("No audio input device"));

        let f: DetectionFailure = TranscodeError::decode("probe: bad").into();
        assert_eq!(f.kind, ErrorKind::DecodeFailure);
        assert!(f.to_string().contains("probe: bad"));
    }
}
