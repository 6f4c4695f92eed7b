//! File intake: turn a user-selected file into a pending audio source.
//!
//! Only declared `audio/*` media types are accepted. Anything else is dropped
//! without an error so the previously pending source stays untouched.

use std::path::Path;

use crate::source::AudioSource;

const AUDIO_PREFIX: &str = "audio/";

/// A file-like object from outside the core: a picker, a drop, or a CLI path.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub bytes: Vec<u8>,
    pub declared_media_type: String,
    pub name: String,
}

impl IncomingFile {
    /// Read a file from disk. The media type is `media_type` when given,
    /// otherwise guessed from the extension.
    pub async fn from_path(path: &Path, media_type: Option<&str>) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();
        let declared_media_type = match media_type {
            Some(t) => t.to_string(),
            None => guess_media_type(&name).to_string(),
        };

        log::debug!(
            "Loaded {} ({} bytes, declared type {})",
            name,
            bytes.len(),
            declared_media_type
        );

        Ok(Self {
            bytes,
            declared_media_type,
            name,
        })
    }
}

/// Media type for a file name, by extension. Unknown extensions map to
/// `application/octet-stream`, which intake rejects.
pub fn guess_media_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") | Some("wave") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("webm") | Some("weba") => "audio/webm",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("aif") | Some("aiff") => "audio/aiff",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

pub struct FileIntakeValidator;

impl FileIntakeValidator {
    /// Whether a declared media type is audio. Comparison ignores ASCII case.
    pub fn accepts(declared_media_type: &str) -> bool {
        declared_media_type
            .get(..AUDIO_PREFIX.len())
            .map(|prefix| prefix.eq_ignore_ascii_case(AUDIO_PREFIX))
            .unwrap_or(false)
    }

    /// `Some(Uploaded)` for audio files, `None` for anything else.
    pub fn validate(file: IncomingFile) -> Option<AudioSource> {
        if !Self::accepts(&file.declared_media_type) {
            log::info!(
                "Ignoring {}: declared type {:?} is not audio",
                file.name,
                file.declared_media_type
            );
            return None;
        }

        Some(AudioSource::Uploaded {
            file_bytes: file.bytes.into(),
            declared_type: file.declared_media_type,
            display_name: file.name,
        })
    }
}
