pub mod audio;
pub mod detection;
pub mod effects;
pub mod intake;
pub mod settings;
pub mod source;
pub mod state_machine;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use detection::{ErrorKind, PresentedResult};
use effects::EffectRunner;
use state_machine::{reduce, AnalysisState, CaptureState, Effect, Event, State};

/// Snapshot of a session for whatever is driving it.
/// Serializes as `{ "capture": { "status": "recording", "elapsedSecs": 5, ... }, ... }`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub capture: CaptureUi,
    pub pending: Option<PendingUi>,
    pub analysis: AnalysisUi,
    pub capture_error: Option<ErrorUi>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CaptureUi {
    Idle,
    RequestingDevice,
    Recording {
        #[serde(rename = "elapsedSecs")]
        elapsed_secs: u64,
        segments: usize,
    },
    Finalizing,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingUi {
    pub kind: String,
    pub name: Option<String>,
    pub media_type: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorUi {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AnalysisUi {
    Empty,
    Analyzing,
    Result(PresentedResult),
    Error(ErrorUi),
}

impl Default for UiState {
    fn default() -> Self {
        state_to_ui(&State::default())
    }
}

/// Convert internal State to the UI snapshot
pub fn state_to_ui(state: &State) -> UiState {
    let capture = match &state.capture {
        CaptureState::Idle => CaptureUi::Idle,
        CaptureState::RequestingDevice { .. } => CaptureUi::RequestingDevice,
        CaptureState::Recording {
            started_at,
            segments,
            ..
        } => CaptureUi::Recording {
            elapsed_secs: started_at.elapsed().as_secs(),
            segments: segments.len(),
        },
        CaptureState::Finalizing { .. } => CaptureUi::Finalizing,
    };

    let pending = state.pending.as_ref().map(|source| PendingUi {
        kind: source.kind().to_string(),
        name: source.display_name().map(str::to_string),
        media_type: source.media_type().to_string(),
        bytes: source.bytes().len(),
    });

    let analysis = match &state.analysis {
        AnalysisState::Empty => AnalysisUi::Empty,
        AnalysisState::InFlight { .. } => AnalysisUi::Analyzing,
        AnalysisState::Completed(result) => AnalysisUi::Result(PresentedResult::from(result)),
        AnalysisState::Failed(failure) => AnalysisUi::Error(ErrorUi {
            kind: failure.kind,
            message: failure.message.clone(),
        }),
    };

    UiState {
        capture,
        pending,
        analysis,
        capture_error: state.capture_error.as_ref().map(|f| ErrorUi {
            kind: f.kind,
            message: f.message.clone(),
        }),
    }
}

/// Publish a UI snapshot to all watchers
fn emit_ui_state(ui: &watch::Sender<UiState>, state: &State) {
    let ui_state = state_to_ui(state);
    log::debug!("Emitting UI state: {:?}", serde_json::to_string(&ui_state));
    ui.send_replace(ui_state);
}

/// State loop handle - holds the event sender for dispatching events
#[derive(Clone)]
pub struct StateLoopHandle {
    tx: mpsc::Sender<Event>,
}

impl StateLoopHandle {
    /// Send an event to the state machine
    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }
}

/// Run the main state loop
pub async fn run_state_loop(
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    effect_runner: Arc<dyn EffectRunner>,
    ui: watch::Sender<UiState>,
) {
    let mut state = State::default();

    // Emit initial state
    emit_ui_state(&ui, &state);
    log::info!("State loop started");

    while let Some(event) = rx.recv().await {
        log::debug!("Received event: {:?}", event);

        // Handle Exit at the edge
        if matches!(event, Event::Exit) {
            log::info!("Exit requested, shutting down state loop");
            break;
        }

        let old_capture = state.capture.label();
        let old_analysis = state.analysis.label();
        let (next, effects) = reduce(std::mem::take(&mut state), event);
        state = next;

        // Log state transitions
        if old_capture != state.capture.label() {
            log::info!(
                "Capture transition: {} -> {}",
                old_capture,
                state.capture.label()
            );
        }
        if old_analysis != state.analysis.label() {
            log::info!(
                "Analysis transition: {} -> {}",
                old_analysis,
                state.analysis.label()
            );
        }

        // Execute effects
        for eff in effects {
            match eff {
                Effect::EmitUi => emit_ui_state(&ui, &state),
                other => effect_runner.spawn(other, tx.clone()),
            }
        }
    }

    effect_runner.shutdown();
    log::info!("State loop ended");
}

/// Start a session loop on the current runtime.
///
/// Returns the handle for sending events, a watcher for UI snapshots, and
/// the loop task, which finishes after `Event::Exit`.
pub fn spawn_session(
    effect_runner: Arc<dyn EffectRunner>,
) -> (StateLoopHandle, watch::Receiver<UiState>, JoinHandle<()>) {
    // Create event channel for state machine
    let (tx, rx) = mpsc::channel::<Event>(32);
    let (ui_tx, ui_rx) = watch::channel(UiState::default());

    let handle = StateLoopHandle { tx: tx.clone() };
    let task = tokio::spawn(run_state_loop(rx, tx, effect_runner, ui_tx));

    (handle, ui_rx, task)
}
