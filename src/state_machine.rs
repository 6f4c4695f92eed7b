//! State machine for a VoiceGuard session
//!
//! This module implements the core state machine using a single-writer pattern.
//! All state transitions go through the `reduce()` function, which returns
//! the next state and a list of effects to execute.
//!
//! A session has three independent parts: the capture workflow (microphone),
//! the pending source (what would be submitted), and the analysis (the last
//! submission and its outcome).

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::detection::{DetectionFailure, DetectionResult};
use crate::intake::{FileIntakeValidator, IncomingFile};
use crate::source::AudioSource;

/// Recording auto-finalizes after this long.
pub const MAX_RECORDING: Duration = Duration::from_secs(120);

/// Capture workflow.
#[derive(Debug, Clone, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    RequestingDevice {
        capture_id: Uuid,
    },
    Recording {
        capture_id: Uuid,
        started_at: Instant,
        mime_hint: String,
        segments: Vec<Vec<u8>>,
    },
    /// Device release requested; late segments still append.
    Finalizing {
        capture_id: Uuid,
        mime_hint: String,
        segments: Vec<Vec<u8>>,
    },
}

impl CaptureState {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::RequestingDevice { .. } => "requestingDevice",
            CaptureState::Recording { .. } => "recording",
            CaptureState::Finalizing { .. } => "finalizing",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum AnalysisState {
    #[default]
    Empty,
    InFlight {
        submission_id: Uuid,
    },
    Completed(DetectionResult),
    Failed(DetectionFailure),
}

impl AnalysisState {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisState::Empty => "empty",
            AnalysisState::InFlight { .. } => "inFlight",
            AnalysisState::Completed(_) => "completed",
            AnalysisState::Failed(_) => "failed",
        }
    }

    fn is_in_flight(&self) -> bool {
        matches!(self, AnalysisState::InFlight { .. })
    }
}

/// Internal state of a session.
/// This is the authoritative state - all transitions go through the reducer.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub capture: CaptureState,
    /// At most one source; a newer one of either kind replaces it.
    pub pending: Option<AudioSource>,
    pub analysis: AnalysisState,
    /// Why the last capture attempt could not start.
    pub capture_error: Option<DetectionFailure>,
}

/// Events that can trigger state transitions.
/// These come from the user-facing driver and from effect tasks.
#[derive(Debug)]
pub enum Event {
    /// Start recording from the microphone
    BeginCapture,
    /// Stop recording and keep what was captured
    EndCapture,
    /// Stop recording and discard what was captured
    AbandonCapture,
    /// Session shutdown requested
    Exit,

    // Device events
    DeviceAcquired {
        id: Uuid,
        mime_hint: String,
    },
    DeviceUnavailable {
        id: Uuid,
        failure: DetectionFailure,
    },
    SegmentCaptured {
        id: Uuid,
        bytes: Vec<u8>,
    },
    DeviceReleased {
        id: Uuid,
    },
    /// Once per second while recording (includes id to prevent stale ticks)
    RecordingTick {
        id: Uuid,
    },

    // Source events
    FileSelected(IncomingFile),
    ClearSource,

    // Submission events
    SubmitRequested {
        language_hint: String,
    },
    DetectionOk {
        id: Uuid,
        result: DetectionResult,
    },
    DetectionFail {
        id: Uuid,
        failure: DetectionFailure,
    },
}

/// Effects to be executed after a state transition.
/// The effect runner handles these asynchronously.
#[derive(Debug, Clone)]
pub enum Effect {
    AcquireDevice {
        id: Uuid,
    },
    /// Idempotent; always answered with `DeviceReleased`
    ReleaseDevice {
        id: Uuid,
    },
    /// Start sending RecordingTick events every second while recording
    StartRecordingTick {
        id: Uuid,
    },
    StartDetection {
        id: Uuid,
        source: AudioSource,
        language_hint: String,
    },
    /// Signal to publish a fresh UI snapshot
    EmitUi,
}

/// Reducer function: (state, event) -> (next_state, effects)
///
/// Key rules:
/// - Ignore events with stale capture or submission IDs
/// - Emit EmitUi after every visible change
/// - Exit is handled by the state loop, not here
pub fn reduce(state: State, event: Event) -> (State, Vec<Effect>) {
    match event {
        Event::FileSelected(file) => select_file(state, file),
        Event::ClearSource => clear_source(state),
        Event::SubmitRequested { language_hint } => submit(state, language_hint),
        Event::DetectionOk { id, result } => settle(state, id, AnalysisState::Completed(result)),
        Event::DetectionFail { id, failure } => settle(state, id, AnalysisState::Failed(failure)),
        Event::Exit => (state, vec![]),
        capture_event => reduce_capture(state, capture_event),
    }
}

fn reduce_capture(mut state: State, event: Event) -> (State, Vec<Effect>) {
    use CaptureState::*;
    use Effect::*;

    let capture = std::mem::take(&mut state.capture);

    let (capture, effects) = match (capture, event) {
        // -----------------
        // Idle
        // -----------------
        (Idle, Event::BeginCapture) => {
            let id = Uuid::new_v4();
            state.capture_error = None;
            (
                RequestingDevice { capture_id: id },
                vec![AcquireDevice { id }, EmitUi],
            )
        }

        // -----------------
        // RequestingDevice
        // -----------------
        (
            RequestingDevice { capture_id },
            Event::DeviceAcquired { id, mime_hint },
        ) if capture_id == id => (
            Recording {
                capture_id,
                started_at: Instant::now(),
                mime_hint,
                segments: Vec::new(),
            },
            vec![StartRecordingTick { id }, EmitUi],
        ),
        (RequestingDevice { capture_id }, Event::DeviceUnavailable { id, failure })
            if capture_id == id =>
        {
            log::warn!("Capture {} could not start: {}", capture_id, failure);
            state.capture_error = Some(failure);
            (Idle, vec![EmitUi])
        }

        // -----------------
        // Recording
        // -----------------
        (
            Recording {
                capture_id,
                started_at,
                mime_hint,
                mut segments,
            },
            Event::SegmentCaptured { id, bytes },
        ) if capture_id == id => {
            if !bytes.is_empty() {
                segments.push(bytes);
            }
            (
                Recording {
                    capture_id,
                    started_at,
                    mime_hint,
                    segments,
                },
                vec![],
            )
        }
        (
            Recording {
                capture_id,
                mime_hint,
                segments,
                ..
            },
            Event::EndCapture,
        ) => (
            Finalizing {
                capture_id,
                mime_hint,
                segments,
            },
            vec![ReleaseDevice { id: capture_id }, EmitUi],
        ),
        // Device lost mid-recording: keep what arrived and finalize
        (
            Recording {
                capture_id,
                mime_hint,
                segments,
                ..
            },
            Event::DeviceUnavailable { id, failure },
        ) if capture_id == id => {
            log::warn!("Capture {} lost its device: {}", capture_id, failure);
            state.capture_error = Some(failure);
            (
                Finalizing {
                    capture_id,
                    mime_hint,
                    segments,
                },
                vec![ReleaseDevice { id: capture_id }, EmitUi],
            )
        }
        // Tick during recording - update UI and check for max duration
        (
            Recording {
                capture_id,
                started_at,
                mime_hint,
                segments,
            },
            Event::RecordingTick { id },
        ) if capture_id == id => {
            let elapsed = started_at.elapsed();
            if elapsed >= MAX_RECORDING {
                log::warn!(
                    "Capture {} auto-stopped after {:?} (max duration reached)",
                    capture_id,
                    elapsed
                );
                (
                    Finalizing {
                        capture_id,
                        mime_hint,
                        segments,
                    },
                    vec![ReleaseDevice { id: capture_id }, EmitUi],
                )
            } else {
                (
                    Recording {
                        capture_id,
                        started_at,
                        mime_hint,
                        segments,
                    },
                    vec![EmitUi],
                )
            }
        }

        // Abandon discards whatever was captured
        (
            RequestingDevice { capture_id } | Recording { capture_id, .. },
            Event::AbandonCapture,
        ) => {
            log::info!("Capture {} abandoned", capture_id);
            (Idle, vec![ReleaseDevice { id: capture_id }, EmitUi])
        }

        // -----------------
        // Finalizing
        // -----------------
        (
            Finalizing {
                capture_id,
                mime_hint,
                mut segments,
            },
            Event::SegmentCaptured { id, bytes },
        ) if capture_id == id => {
            if !bytes.is_empty() {
                segments.push(bytes);
            }
            (
                Finalizing {
                    capture_id,
                    mime_hint,
                    segments,
                },
                vec![],
            )
        }
        (
            Finalizing {
                capture_id,
                mime_hint,
                segments,
            },
            Event::DeviceReleased { id },
        ) if capture_id == id => match AudioSource::from_segments(&segments, &mime_hint) {
            Some(source) => {
                log::info!(
                    "Capture {} finalized: {} segments, {} bytes",
                    capture_id,
                    segments.len(),
                    source.bytes().len()
                );
                replace_pending(&mut state, source);
                (Idle, vec![EmitUi])
            }
            None => {
                log::info!("Capture {} finalized with no audio", capture_id);
                (Idle, vec![EmitUi])
            }
        },
        (current @ Finalizing { .. }, Event::BeginCapture) => {
            log::warn!("Begin capture rejected while finalizing");
            (current, vec![])
        }

        // -----------------
        // Stale device grants must not leak the device
        // -----------------
        (current, Event::DeviceAcquired { id, .. }) => {
            log::debug!("Releasing stale device grant {}", id);
            (current, vec![ReleaseDevice { id }])
        }

        // -----------------
        // Re-entrant begin, end without recording, stale device events:
        // no transition
        // -----------------
        (current, _) => (current, vec![]),
    };

    state.capture = capture;
    (state, effects)
}

fn replace_pending(state: &mut State, source: AudioSource) {
    if let Some(previous) = &state.pending {
        log::debug!(
            "Pending {} source replaced by {}",
            previous.kind(),
            source.kind()
        );
    }
    state.pending = Some(source);
    if !state.analysis.is_in_flight() {
        state.analysis = AnalysisState::Empty;
    }
}

fn select_file(mut state: State, file: IncomingFile) -> (State, Vec<Effect>) {
    match FileIntakeValidator::validate(file) {
        Some(source) => {
            replace_pending(&mut state, source);
            (state, vec![Effect::EmitUi])
        }
        None => (state, vec![]),
    }
}

fn clear_source(mut state: State) -> (State, Vec<Effect>) {
    state.pending = None;
    if !state.analysis.is_in_flight() {
        state.analysis = AnalysisState::Empty;
    }
    (state, vec![Effect::EmitUi])
}

fn submit(mut state: State, language_hint: String) -> (State, Vec<Effect>) {
    if state.analysis.is_in_flight() {
        log::debug!("Submit ignored: a submission is already in flight");
        return (state, vec![]);
    }
    let Some(source) = state.pending.clone() else {
        log::debug!("Submit ignored: nothing pending");
        return (state, vec![]);
    };

    let id = Uuid::new_v4();
    log::info!("Submission {} started for {:?}", id, source);
    state.analysis = AnalysisState::InFlight { submission_id: id };
    (
        state,
        vec![
            Effect::StartDetection {
                id,
                source,
                language_hint,
            },
            Effect::EmitUi,
        ],
    )
}

fn settle(mut state: State, id: Uuid, outcome: AnalysisState) -> (State, Vec<Effect>) {
    match state.analysis {
        AnalysisState::InFlight { submission_id } if submission_id == id => {
            state.analysis = outcome;
            (state, vec![Effect::EmitUi])
        }
        // Stale submission result
        _ => (state, vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Confidence, ErrorKind};

    fn has(effects: &[Effect], f: impl Fn(&Effect) -> bool) -> bool {
        effects.iter().any(f)
    }

    fn recording(id: Uuid) -> State {
        State {
            capture: CaptureState::Recording {
                capture_id: id,
                started_at: Instant::now(),
                mime_hint: "audio/L16; rate=16000; channels=1".to_string(),
                segments: Vec::new(),
            },
            ..State::default()
        }
    }

    fn audio_file(name: &str) -> IncomingFile {
        IncomingFile {
            bytes: vec![9, 9, 9],
            declared_media_type: "audio/wav".to_string(),
            name: name.to_string(),
        }
    }

    fn result(is_human: bool) -> DetectionResult {
        DetectionResult {
            language: "English".to_string(),
            is_human,
            confidence: Confidence::Percent(93),
        }
    }

    #[test]
    fn idle_begin_capture_requests_device() {
        let (next, effects) = reduce(State::default(), Event::BeginCapture);
        assert!(matches!(next.capture, CaptureState::RequestingDevice { .. }));
        assert!(has(&effects, |e| matches!(e, Effect::AcquireDevice { .. })));
        assert!(has(&effects, |e| matches!(e, Effect::EmitUi)));
    }

    #[test]
    fn device_acquired_starts_recording() {
        let id = Uuid::new_v4();
        let state = State {
            capture: CaptureState::RequestingDevice { capture_id: id },
            ..State::default()
        };
        let (next, effects) = reduce(
            state,
            Event::DeviceAcquired {
                id,
                mime_hint: "audio/L16; rate=8000; channels=1".to_string(),
            },
        );
        assert!(matches!(next.capture, CaptureState::Recording { .. }));
        assert!(has(&effects, |e| matches!(e, Effect::StartRecordingTick { .. })));
    }

    #[test]
    fn begin_capture_is_reentrant_noop() {
        let id = Uuid::new_v4();
        let (next, effects) = reduce(recording(id), Event::BeginCapture);
        assert!(matches!(next.capture, CaptureState::Recording { capture_id, .. } if capture_id == id));
        assert!(effects.is_empty());

        let state = State {
            capture: CaptureState::RequestingDevice { capture_id: id },
            ..State::default()
        };
        let (next, effects) = reduce(state, Event::BeginCapture);
        assert!(matches!(next.capture, CaptureState::RequestingDevice { .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn begin_capture_rejected_while_finalizing() {
        let id = Uuid::new_v4();
        let state = State {
            capture: CaptureState::Finalizing {
                capture_id: id,
                mime_hint: String::new(),
                segments: vec![vec![1, 2]],
            },
            ..State::default()
        };
        let (next, effects) = reduce(state, Event::BeginCapture);
        assert!(matches!(next.capture, CaptureState::Finalizing { .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn device_unavailable_records_failure_and_returns_to_idle() {
        let id = Uuid::new_v4();
        let state = State {
            capture: CaptureState::RequestingDevice { capture_id: id },
            ..State::default()
        };
        let failure = DetectionFailure::new(ErrorKind::DeviceUnavailable, "denied");
        let (next, _) = reduce(state, Event::DeviceUnavailable { id, failure });
        assert!(matches!(next.capture, CaptureState::Idle));
        assert_eq!(
            next.capture_error.map(|f| f.kind),
            Some(ErrorKind::DeviceUnavailable)
        );

        // A new attempt clears the old failure
        let state = State {
            capture_error: Some(DetectionFailure::new(ErrorKind::DeviceUnavailable, "x")),
            ..State::default()
        };
        let (next, _) = reduce(state, Event::BeginCapture);
        assert!(next.capture_error.is_none());
    }

    #[test]
    fn segments_append_in_order_and_skip_empty() {
        let id = Uuid::new_v4();
        let mut state = recording(id);
        for bytes in [vec![1, 2], vec![], vec![3, 4]] {
            state = reduce(state, Event::SegmentCaptured { id, bytes }).0;
        }
        // Stale capture id
        state = reduce(
            state,
            Event::SegmentCaptured {
                id: Uuid::new_v4(),
                bytes: vec![7],
            },
        )
        .0;

        match &state.capture {
            CaptureState::Recording { segments, .. } => {
                assert_eq!(segments, &vec![vec![1, 2], vec![3, 4]]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn end_capture_finalizes_then_emits_recorded_source() {
        let id = Uuid::new_v4();
        let mut state = recording(id);
        state = reduce(state, Event::SegmentCaptured { id, bytes: vec![1, 2] }).0;

        let (state, effects) = reduce(state, Event::EndCapture);
        assert!(matches!(state.capture, CaptureState::Finalizing { .. }));
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseDevice { id: rid } if *rid == id)));

        // Late flush from the device callback
        let (state, _) = reduce(state, Event::SegmentCaptured { id, bytes: vec![3] });
        let (state, _) = reduce(state, Event::DeviceReleased { id });

        assert!(matches!(state.capture, CaptureState::Idle));
        let pending = state.pending.unwrap();
        assert!(pending.is_recorded());
        assert_eq!(pending.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn zero_segments_leaves_no_source() {
        let id = Uuid::new_v4();
        let (state, _) = reduce(recording(id), Event::EndCapture);
        let (state, effects) = reduce(state, Event::DeviceReleased { id });
        assert!(matches!(state.capture, CaptureState::Idle));
        assert!(state.pending.is_none());
        assert!(has(&effects, |e| matches!(e, Effect::EmitUi)));
    }

    #[test]
    fn end_capture_while_requesting_is_noop() {
        let id = Uuid::new_v4();
        let state = State {
            capture: CaptureState::RequestingDevice { capture_id: id },
            ..State::default()
        };
        let (next, effects) = reduce(state, Event::EndCapture);
        assert!(matches!(next.capture, CaptureState::RequestingDevice { .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn abandon_discards_segments_and_releases() {
        let id = Uuid::new_v4();
        let state = reduce(recording(id), Event::SegmentCaptured { id, bytes: vec![1] }).0;
        let (next, effects) = reduce(state, Event::AbandonCapture);
        assert!(matches!(next.capture, CaptureState::Idle));
        assert!(next.pending.is_none());
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseDevice { .. })));
    }

    #[test]
    fn device_lost_while_recording_finalizes_with_error() {
        let id = Uuid::new_v4();
        let state = reduce(recording(id), Event::SegmentCaptured { id, bytes: vec![1, 2] }).0;

        let failure = DetectionFailure::new(ErrorKind::DeviceUnavailable, "gone");
        let (state, effects) = reduce(state, Event::DeviceUnavailable { id, failure });
        assert!(matches!(state.capture, CaptureState::Finalizing { .. }));
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseDevice { id: rid } if *rid == id)));
        assert_eq!(
            state.capture_error.as_ref().map(|f| f.kind),
            Some(ErrorKind::DeviceUnavailable)
        );

        let (state, _) = reduce(state, Event::DeviceReleased { id });
        assert!(matches!(state.capture, CaptureState::Idle));
        assert_eq!(state.pending.unwrap().bytes(), &[1, 2]);
        assert!(state.capture_error.is_some());
    }

    #[test]
    fn stale_device_grant_is_released() {
        let stale = Uuid::new_v4();
        let (next, effects) = reduce(
            State::default(),
            Event::DeviceAcquired {
                id: stale,
                mime_hint: String::new(),
            },
        );
        assert!(matches!(next.capture, CaptureState::Idle));
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseDevice { id } if *id == stale)));
    }

    #[test]
    fn tick_updates_ui_until_max_duration() {
        let id = Uuid::new_v4();
        let (next, effects) = reduce(recording(id), Event::RecordingTick { id });
        assert!(matches!(next.capture, CaptureState::Recording { .. }));
        assert!(has(&effects, |e| matches!(e, Effect::EmitUi)));

        let Some(started_at) = Instant::now().checked_sub(MAX_RECORDING) else {
            return;
        };
        let state = State {
            capture: CaptureState::Recording {
                capture_id: id,
                started_at,
                mime_hint: String::new(),
                segments: vec![vec![1]],
            },
            ..State::default()
        };
        let (next, effects) = reduce(state, Event::RecordingTick { id });
        assert!(matches!(next.capture, CaptureState::Finalizing { .. }));
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseDevice { .. })));
    }

    #[test]
    fn uploaded_and_recorded_sources_replace_each_other() {
        let (state, _) = reduce(State::default(), Event::FileSelected(audio_file("a.wav")));
        assert!(!state.pending.as_ref().unwrap().is_recorded());

        // Recording supersedes the upload
        let id = Uuid::new_v4();
        let state = State {
            capture: CaptureState::Finalizing {
                capture_id: id,
                mime_hint: "audio/L16; rate=8000".to_string(),
                segments: vec![vec![5, 6]],
            },
            ..state
        };
        let (state, _) = reduce(state, Event::DeviceReleased { id });
        assert!(state.pending.as_ref().unwrap().is_recorded());

        // And a new upload supersedes the recording
        let (state, _) = reduce(state, Event::FileSelected(audio_file("b.mp3")));
        let pending = state.pending.unwrap();
        assert!(!pending.is_recorded());
        assert_eq!(pending.display_name(), Some("b.mp3"));
    }

    #[test]
    fn non_audio_file_is_dropped_silently() {
        let (state, _) = reduce(State::default(), Event::FileSelected(audio_file("a.wav")));
        let text = IncomingFile {
            bytes: b"hello".to_vec(),
            declared_media_type: "text/plain".to_string(),
            name: "notes.txt".to_string(),
        };
        let (next, effects) = reduce(state, Event::FileSelected(text));
        assert!(effects.is_empty());
        assert_eq!(next.pending.unwrap().display_name(), Some("a.wav"));

        let (next, _) = reduce(
            State::default(),
            Event::FileSelected(IncomingFile {
                bytes: vec![],
                declared_media_type: "text/plain".to_string(),
                name: "x.txt".to_string(),
            }),
        );
        assert!(next.pending.is_none());
    }

    #[test]
    fn submit_without_source_is_ignored() {
        let (next, effects) = reduce(
            State::default(),
            Event::SubmitRequested {
                language_hint: "en".to_string(),
            },
        );
        assert!(matches!(next.analysis, AnalysisState::Empty));
        assert!(effects.is_empty());
    }

    #[test]
    fn submit_starts_detection_once() {
        let (state, _) = reduce(State::default(), Event::FileSelected(audio_file("a.wav")));
        let (state, effects) = reduce(
            state,
            Event::SubmitRequested {
                language_hint: "en".to_string(),
            },
        );
        assert!(matches!(state.analysis, AnalysisState::InFlight { .. }));
        assert!(has(&effects, |e| matches!(
            e,
            Effect::StartDetection { language_hint, .. } if language_hint == "en"
        )));

        // A second submit while in flight does nothing
        let (state, effects) = reduce(
            state,
            Event::SubmitRequested {
                language_hint: "en".to_string(),
            },
        );
        assert!(effects.is_empty());
        assert!(matches!(state.analysis, AnalysisState::InFlight { .. }));
    }

    #[test]
    fn detection_outcomes_settle_matching_submission_only() {
        let id = Uuid::new_v4();
        let in_flight = State {
            analysis: AnalysisState::InFlight { submission_id: id },
            ..State::default()
        };

        let (next, effects) = reduce(
            in_flight.clone(),
            Event::DetectionOk {
                id: Uuid::new_v4(),
                result: result(true),
            },
        );
        assert!(matches!(next.analysis, AnalysisState::InFlight { .. }));
        assert!(effects.is_empty());

        let (next, _) = reduce(
            in_flight.clone(),
            Event::DetectionOk {
                id,
                result: result(true),
            },
        );
        assert!(matches!(next.analysis, AnalysisState::Completed(ref r) if r.is_human));

        let (next, _) = reduce(
            in_flight,
            Event::DetectionFail {
                id,
                failure: DetectionFailure::connectivity("down"),
            },
        );
        assert!(matches!(
            next.analysis,
            AnalysisState::Failed(ref f) if f.kind == ErrorKind::ConnectivityError
        ));
    }

    #[test]
    fn failed_analysis_allows_resubmission() {
        let (state, _) = reduce(State::default(), Event::FileSelected(audio_file("a.wav")));
        let state = State {
            analysis: AnalysisState::Failed(DetectionFailure::remote("Invalid API key")),
            ..state
        };
        let (next, effects) = reduce(
            state,
            Event::SubmitRequested {
                language_hint: "en".to_string(),
            },
        );
        assert!(matches!(next.analysis, AnalysisState::InFlight { .. }));
        assert!(has(&effects, |e| matches!(e, Effect::StartDetection { .. })));
    }

    #[test]
    fn clear_source_drops_pending_and_result() {
        let (state, _) = reduce(State::default(), Event::FileSelected(audio_file("a.wav")));
        let state = State {
            analysis: AnalysisState::Completed(result(false)),
            ..state
        };
        let (next, _) = reduce(state, Event::ClearSource);
        assert!(next.pending.is_none());
        assert!(matches!(next.analysis, AnalysisState::Empty));
    }
}
