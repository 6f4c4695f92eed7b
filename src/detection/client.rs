//! HTTP client for the voice classification service
//!
//! Sends the canonical WAV payload to `POST /api/detect-voice` and maps the
//! response (or its absence) into a `DetectionResult` or a typed failure.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::types::{
    DetectionFailure, DetectionRequest, DetectionResult, WireErrorBody, WireHealth, WireResponse,
};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DETECT_PATH: &str = "/api/detect-voice";
pub const HEALTH_PATH: &str = "/api/health";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, without a trailing path.
    pub server_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for one classification service. Cheap to share behind an `Arc`;
/// the underlying connection pool is reused across requests.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    http: Client,
    config: ClientConfig,
}

impl DetectionClient {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.server_url.trim_end_matches('/'), path)
    }

    /// Submit a canonical payload for classification. Never retried.
    pub async fn submit(
        &self,
        audio_base64: String,
        language_hint: &str,
    ) -> Result<DetectionResult, DetectionFailure> {
        let url = self.endpoint(DETECT_PATH);
        let body = DetectionRequest::wav(language_hint, audio_base64);

        log::info!(
            "Submitting {} bytes of payload to {} (language={})",
            body.audio_base64.len(),
            url,
            body.language
        );

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_failure(&url, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_failure(&url, &e))?;

        if !status.is_success() {
            let message = remote_error_message(status, &text);
            log::error!("Detection service error ({}): {}", status.as_u16(), message);
            return Err(DetectionFailure::remote(message));
        }

        let wire: WireResponse = serde_json::from_str(&text).map_err(|e| {
            log::error!("Unparseable detection response: {}", e);
            DetectionFailure::remote(format!("Invalid response from detection service: {}", e))
        })?;

        let result = DetectionResult::from_wire(wire);
        log::info!(
            "Detection complete: human={} confidence={} language={:?}",
            result.is_human,
            result.confidence,
            result.language
        );
        Ok(result)
    }

    /// Probe `GET /api/health`.
    pub async fn health(&self) -> Result<(), DetectionFailure> {
        let url = self.endpoint(HEALTH_PATH);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_failure(&url, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_failure(&url, &e))?;

        if !status.is_success() {
            return Err(DetectionFailure::remote(remote_error_message(status, &text)));
        }

        match serde_json::from_str::<WireHealth>(&text) {
            Ok(health) if health.status == "ok" => Ok(()),
            Ok(health) => Err(DetectionFailure::remote(format!(
                "Service reported status {:?}",
                health.status
            ))),
            Err(e) => Err(DetectionFailure::remote(format!(
                "Invalid health response: {}",
                e
            ))),
        }
    }

    fn transport_failure(&self, url: &str, err: &reqwest::Error) -> DetectionFailure {
        log::warn!("Request to {} failed: {}", url, err);
        let message = if err.is_timeout() {
            format!(
                "Request to {} timed out after {}s. Check that the service is responsive.",
                url,
                self.config.timeout.as_secs()
            )
        } else if err.is_connect() {
            format!(
                "Connection failed. Start the detection service at {} and try again.",
                self.config.server_url
            )
        } else {
            format!("Could not reach {}: {}", url, err)
        };
        DetectionFailure::connectivity(message)
    }
}

/// `detail` from a JSON error body, else the status reason.
fn remote_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<WireErrorBody>(body) {
        return parsed.detail;
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| "Request failed".to_string())
}
