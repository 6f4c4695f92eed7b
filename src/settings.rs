use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::detection::{ClientConfig, DEFAULT_SERVER_URL};

const SETTINGS_DIR_NAME: &str = "voiceguard";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Environment variable holding the service API key.
pub const API_KEY_ENV: &str = "VOICEGUARD_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    /// Base URL of the detection service.
    pub server_url: String,

    /// Language code sent with every submission.
    pub language_hint: String,

    /// Requests that take longer than this fail with a connectivity error.
    pub request_timeout_secs: u64,

    /// API key for the service. `VOICEGUARD_API_KEY` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            language_hint: "en".to_string(),
            request_timeout_secs: 60,
            api_key: None,
        }
    }
}

impl AppSettings {
    /// Client configuration, with the API key resolved from the environment
    /// first and this file second.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.server_url.clone(),
            api_key: get_api_key().or_else(|| self.api_key.clone().filter(|k| !k.is_empty())),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }
}

/// Get the service API key from the environment
pub fn get_api_key() -> Option<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.is_empty() => Some(key),
        _ => None,
    }
}

/// Errors reading or writing the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Failed to {action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid settings in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError {
    let path = path.to_path_buf();
    move |source| SettingsError::Io {
        action,
        path,
        source,
    }
}

/// `<config_dir>/voiceguard/settings.json`
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
}

/// Read settings; `Ok(None)` when the file does not exist yet.
pub fn read_settings(path: &Path) -> Result<Option<AppSettings>, SettingsError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error("read", path)(e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Settings from `path`, or defaults when it is missing or unreadable.
pub fn load_settings(path: &Path) -> AppSettings {
    match read_settings(path) {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => {
            log::warn!("Settings: {}; using defaults", e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error("create directory", parent))?;
    }
    let contents = serde_json::to_string_pretty(settings).map_err(SettingsError::Serialize)?;
    write_atomically(path, contents.as_bytes())
}

/// Readers see either the old file or the new one, never a partial write.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), SettingsError> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, contents).map_err(io_error("write", &tmp_path))?;

    // rename replaces an existing destination on every platform std supports
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(io_error("replace", path)(e));
    }
    log::debug!("Settings: wrote {:?}", path);
    Ok(())
}
