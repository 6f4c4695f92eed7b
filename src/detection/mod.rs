//! Detection module for VoiceGuard
//!
//! Talks to the remote human-vs-AI voice classifier.

mod client;
mod types;

pub use client::{
    ClientConfig, DetectionClient, API_KEY_HEADER, DEFAULT_SERVER_URL, DEFAULT_TIMEOUT,
    DETECT_PATH, HEALTH_PATH,
};
pub use types::{
    Confidence, DetectionFailure, DetectionRequest, DetectionResult, ErrorKind, PresentedResult,
};
