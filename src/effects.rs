//! Effect runner for a VoiceGuard session
//!
//! This module handles executing effects produced by the state machine:
//! opening and releasing the input device, the recording tick, and the
//! transcode-then-submit pipeline. Every effect reports back with an event
//! tagged by the capture or submission id it belongs to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio::{AudioInput, AudioTranscoder, CaptureHandle};
use crate::detection::{DetectionClient, DetectionFailure, ErrorKind};
use crate::state_machine::{Effect, Event};

/// Trait for running effects asynchronously.
/// Completion events are sent back via the provided channel.
pub trait EffectRunner: Send + Sync + 'static {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>);

    /// Release anything still held when the session ends.
    fn shutdown(&self) {}
}

/// An open device plus the task relaying its segments into the session.
struct ActiveCapture {
    handle: CaptureHandle,
    forwarder: JoinHandle<()>,
}

type ActiveCaptures = Arc<Mutex<HashMap<Uuid, ActiveCapture>>>;

fn lock(active: &ActiveCaptures) -> MutexGuard<'_, HashMap<Uuid, ActiveCapture>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Real effect runner: microphone capture, transcoding, and detection.
pub struct PipelineEffectRunner {
    input: Arc<dyn AudioInput>,
    active_captures: ActiveCaptures,
    transcoder: AudioTranscoder,
    client: Arc<DetectionClient>,
}

impl PipelineEffectRunner {
    pub fn new(
        input: Arc<dyn AudioInput>,
        transcoder: AudioTranscoder,
        client: DetectionClient,
    ) -> Arc<Self> {
        Arc::new(Self {
            input,
            active_captures: Arc::new(Mutex::new(HashMap::new())),
            transcoder,
            client: Arc::new(client),
        })
    }

    /// Number of devices currently held open.
    pub fn open_captures(&self) -> usize {
        lock(&self.active_captures).len()
    }
}

impl EffectRunner for PipelineEffectRunner {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::AcquireDevice { id } => {
                let input = self.input.clone();
                let active = self.active_captures.clone();

                tokio::spawn(async move {
                    let (segment_tx, segment_rx) = mpsc::unbounded_channel::<Vec<u8>>();

                    // Opening may block on a permission prompt
                    let opened = tokio::task::spawn_blocking(move || input.open(segment_tx)).await;

                    let handle = match opened {
                        Ok(Ok(handle)) => handle,
                        Ok(Err(err)) => {
                            log::error!("Failed to open input device: {}", err);
                            let _ = tx
                                .send(Event::DeviceUnavailable {
                                    id,
                                    failure: err.into(),
                                })
                                .await;
                            return;
                        }
                        Err(join_err) => {
                            log::error!("Device open task failed: {}", join_err);
                            let _ = tx
                                .send(Event::DeviceUnavailable {
                                    id,
                                    failure: DetectionFailure::new(
                                        ErrorKind::DeviceUnavailable,
                                        format!("Microphone access is needed to record: {}", join_err),
                                    ),
                                })
                                .await;
                            return;
                        }
                    };

                    let mime_hint = handle.mime_hint().to_string();
                    log::info!("Capture {} acquired device ({})", id, mime_hint);

                    // Registered with its forwarder under one lock, so a
                    // release always has something to drain
                    let mut captures = lock(&active);
                    let forwarder = tokio::spawn(forward_segments(
                        id,
                        mime_hint,
                        segment_rx,
                        tx,
                        active.clone(),
                    ));
                    captures.insert(id, ActiveCapture { handle, forwarder });
                });
            }

            Effect::ReleaseDevice { id } => {
                let active = self.active_captures.clone();

                tokio::spawn(async move {
                    let entry = lock(&active).remove(&id);

                    match entry {
                        Some(ActiveCapture {
                            mut handle,
                            forwarder,
                        }) => {
                            // Joins the capture thread
                            if let Err(e) = tokio::task::spawn_blocking(move || handle.release()).await {
                                log::error!("Device release task failed: {}", e);
                            }
                            // The segment sender is gone now; drain what is left
                            let _ = forwarder.await;
                            log::info!("Capture {} released device", id);
                        }
                        None => {
                            log::debug!("ReleaseDevice: no active handle for id={}", id);
                        }
                    }

                    let _ = tx.send(Event::DeviceReleased { id }).await;
                });
            }

            Effect::StartRecordingTick { id } => {
                let active = self.active_captures.clone();
                tokio::spawn(async move {
                    // Send tick events every second while the capture is active
                    let mut interval = tokio::time::interval(Duration::from_secs(1));
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                        if !lock(&active).contains_key(&id) {
                            log::debug!("Recording tick stopping - capture {} no longer active", id);
                            break;
                        }
                        if tx.send(Event::RecordingTick { id }).await.is_err() {
                            log::debug!("Recording tick stopping - channel closed");
                            break;
                        }
                    }
                });
            }

            Effect::StartDetection {
                id,
                source,
                language_hint,
            } => {
                let transcoder = self.transcoder.clone();
                let client = self.client.clone();

                tokio::spawn(async move {
                    let start_time = Instant::now();

                    let transcoded =
                        tokio::task::spawn_blocking(move || transcoder.to_canonical_payload(&source))
                            .await;

                    let payload = match transcoded {
                        Ok(Ok(payload)) => payload,
                        Ok(Err(err)) => {
                            log::error!("Submission {}: transcoding failed: {}", id, err);
                            let _ = tx
                                .send(Event::DetectionFail {
                                    id,
                                    failure: err.into(),
                                })
                                .await;
                            return;
                        }
                        Err(join_err) => {
                            log::error!("Submission {}: transcoding task failed: {}", id, join_err);
                            let _ = tx
                                .send(Event::DetectionFail {
                                    id,
                                    failure: DetectionFailure::new(
                                        ErrorKind::DecodeFailure,
                                        format!("Transcoding task failed: {}", join_err),
                                    ),
                                })
                                .await;
                            return;
                        }
                    };

                    log::debug!(
                        "Submission {}: transcoded in {:?}",
                        id,
                        start_time.elapsed()
                    );

                    let event = match client.submit(payload, &language_hint).await {
                        Ok(result) => Event::DetectionOk { id, result },
                        Err(failure) => Event::DetectionFail { id, failure },
                    };

                    log::info!(
                        "Submission {} settled in {:?}",
                        id,
                        start_time.elapsed()
                    );
                    let _ = tx.send(event).await;
                });
            }

            Effect::EmitUi => {
                // Handled by the state loop
            }
        }
    }

    fn shutdown(&self) {
        let drained: Vec<(Uuid, ActiveCapture)> = lock(&self.active_captures).drain().collect();
        for (id, mut capture) in drained {
            log::info!("Shutdown: releasing capture {}", id);
            capture.handle.release();
            capture.forwarder.abort();
        }
    }
}

/// Announce the device, then relay its segments until the sender closes.
///
/// A sender that closes while the capture is still registered means the
/// device went away on its own; that is reported as `DeviceUnavailable`.
async fn forward_segments(
    id: Uuid,
    mime_hint: String,
    mut segment_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    tx: mpsc::Sender<Event>,
    active: ActiveCaptures,
) {
    if tx.send(Event::DeviceAcquired { id, mime_hint }).await.is_err() {
        log::debug!("Session gone before capture {} started", id);
        let orphan = lock(&active).remove(&id);
        let _ = tokio::task::spawn_blocking(move || drop(orphan)).await;
        return;
    }

    let mut forwarded = 0usize;
    while let Some(bytes) = segment_rx.recv().await {
        if tx.send(Event::SegmentCaptured { id, bytes }).await.is_err() {
            log::debug!("Capture {}: session gone after {} segments", id, forwarded);
            return;
        }
        forwarded += 1;
    }
    log::debug!("Capture {}: forwarded {} segments", id, forwarded);

    // Released captures leave the map before their sender closes
    let still_open = lock(&active).contains_key(&id);
    if still_open {
        log::warn!("Capture {}: input device stopped delivering audio", id);
        let _ = tx
            .send(Event::DeviceUnavailable {
                id,
                failure: DetectionFailure::new(
                    ErrorKind::DeviceUnavailable,
                    "The microphone stopped delivering audio",
                ),
            })
            .await;
    }
}
