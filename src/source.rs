//! The pending audio a user intends to submit.

use std::fmt;
use std::sync::Arc;

/// Audio waiting to be analyzed, from either live capture or file selection.
///
/// Bytes are shared so a snapshot can be handed to a submission without
/// copying while the session keeps its own reference.
#[derive(Clone, PartialEq, Eq)]
pub enum AudioSource {
    Recorded {
        captured_bytes: Arc<[u8]>,
        mime_hint: String,
    },
    Uploaded {
        file_bytes: Arc<[u8]>,
        declared_type: String,
        display_name: String,
    },
}

impl AudioSource {
    /// Concatenate captured segments, in arrival order, into a recorded source.
    /// Returns `None` when nothing was captured.
    pub fn from_segments(segments: &[Vec<u8>], mime_hint: &str) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }
        let total: usize = segments.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for segment in segments {
            bytes.extend_from_slice(segment);
        }
        Some(AudioSource::Recorded {
            captured_bytes: bytes.into(),
            mime_hint: mime_hint.to_string(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            AudioSource::Recorded { captured_bytes, .. } => captured_bytes,
            AudioSource::Uploaded { file_bytes, .. } => file_bytes,
        }
    }

    /// Cheap handle to the underlying bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        match self {
            AudioSource::Recorded { captured_bytes, .. } => captured_bytes.clone(),
            AudioSource::Uploaded { file_bytes, .. } => file_bytes.clone(),
        }
    }

    /// Declared media type (mime hint for recordings).
    pub fn media_type(&self) -> &str {
        match self {
            AudioSource::Recorded { mime_hint, .. } => mime_hint,
            AudioSource::Uploaded { declared_type, .. } => declared_type,
        }
    }

    /// File name for uploads; recordings have none.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            AudioSource::Recorded { .. } => None,
            AudioSource::Uploaded { display_name, .. } => Some(display_name),
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, AudioSource::Recorded { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AudioSource::Recorded { .. } => "recorded",
            AudioSource::Uploaded { .. } => "uploaded",
        }
    }
}

// Byte payloads can be megabytes; print sizes only.
impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::Recorded {
                captured_bytes,
                mime_hint,
            } => f
                .debug_struct("Recorded")
                .field("bytes", &captured_bytes.len())
                .field("mime_hint", mime_hint)
                .finish(),
            AudioSource::Uploaded {
                file_bytes,
                declared_type,
                display_name,
            } => f
                .debug_struct("Uploaded")
                .field("bytes", &file_bytes.len())
                .field("declared_type", declared_type)
                .field("display_name", display_name)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_concatenate_in_order() {
        let segments = vec![vec![1u8, 2], vec![], vec![3, 4, 5]];
        let source = AudioSource::from_segments(&segments, "audio/L16; rate=8000").unwrap();
        assert_eq!(source.bytes(), &[1, 2, 3, 4, 5]);
        assert_eq!(source.media_type(), "audio/L16; rate=8000");
        assert!(source.is_recorded());
        assert_eq!(source.display_name(), None);
    }

    #[test]
    fn no_segments_yields_no_source() {
        assert!(AudioSource::from_segments(&[], "audio/L16").is_none());
    }

    #[test]
    fn debug_omits_payload() {
        let source = AudioSource::Uploaded {
            file_bytes: vec![0u8; 4096].into(),
            declared_type: "audio/wav".to_string(),
            display_name: "clip.wav".to_string(),
        };
        let printed = format!("{:?}", source);
        assert!(printed.contains("4096"));
        assert!(printed.contains("clip.wav"));
        assert!(printed.len() < 200);
    }
}
