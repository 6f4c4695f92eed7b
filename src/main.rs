use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use voiceguard_lib::audio::{AudioTranscoder, CpalMicrophone};
use voiceguard_lib::detection::{DetectionClient, ErrorKind};
use voiceguard_lib::effects::PipelineEffectRunner;
use voiceguard_lib::intake::{FileIntakeValidator, IncomingFile};
use voiceguard_lib::settings::{self, AppSettings};
use voiceguard_lib::state_machine::Event;
use voiceguard_lib::{spawn_session, AnalysisUi, CaptureUi, ErrorUi, StateLoopHandle, UiState};

#[derive(Debug, Parser)]
#[command(
    about = "Ask a VoiceGuard service whether a voice sample is human or AI-generated",
    version
)]
struct Cli {
    /// Settings file (default: <config dir>/voiceguard/settings.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Detection service base URL
    #[arg(long, env = "VOICEGUARD_SERVER", value_name = "URL")]
    server: Option<String>,

    /// Language hint sent with the sample
    #[arg(long, value_name = "CODE")]
    language: Option<String>,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze an audio file
    Analyze {
        file: PathBuf,
        /// Declared media type (default: guessed from the extension)
        #[arg(long = "media-type", value_name = "TYPE")]
        media_type: Option<String>,
    },
    /// Record from the default microphone, then analyze
    Record {
        /// Stop after this many seconds (default: press Enter to stop)
        #[arg(long, value_name = "N")]
        seconds: Option<u64>,
    },
    /// Check that the detection service is up
    Health,
    /// Write a settings file with the current values
    InitConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present (for development convenience)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => settings::default_settings_path()?,
    };
    let mut app_settings = settings::load_settings(&settings_path);
    if let Some(server) = &cli.server {
        app_settings.server_url = server.clone();
    }
    if let Some(language) = &cli.language {
        app_settings.language_hint = language.clone();
    }
    log::debug!("Settings from {:?}: {:?}", settings_path, app_settings.server_url);

    match cli.command {
        Command::InitConfig => {
            settings::save_settings(&settings_path, &app_settings)?;
            println!("Wrote {}", settings_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => health(&app_settings, cli.json).await,
        Command::Analyze { file, media_type } => {
            let incoming = IncomingFile::from_path(&file, media_type.as_deref())
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            if !FileIntakeValidator::accepts(&incoming.declared_media_type) {
                let error = ErrorUi {
                    kind: ErrorKind::InvalidMediaType,
                    message: format!(
                        "{} is not an audio file (declared type {})",
                        incoming.name, incoming.declared_media_type
                    ),
                };
                return Ok(report_error(&error, cli.json));
            }
            analyze(&app_settings, incoming, cli.json).await
        }
        Command::Record { seconds } => record(&app_settings, seconds, cli.json).await,
    }
}

fn build_client(app_settings: &AppSettings) -> Result<DetectionClient> {
    DetectionClient::new(app_settings.client_config()).context("Failed to build HTTP client")
}

async fn health(app_settings: &AppSettings, json: bool) -> Result<ExitCode> {
    let client = build_client(app_settings)?;
    match client.health().await {
        Ok(()) => {
            if json {
                println!("{}", serde_json::json!({ "status": "ok", "server": client.server_url() }));
            } else {
                println!("Service at {} is up", client.server_url());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => Ok(report_error(
            &ErrorUi {
                kind: failure.kind,
                message: failure.message,
            },
            json,
        )),
    }
}

type Session = (
    StateLoopHandle,
    watch::Receiver<UiState>,
    tokio::task::JoinHandle<()>,
);

fn start_session(app_settings: &AppSettings) -> Result<Session> {
    let runner = PipelineEffectRunner::new(
        Arc::new(CpalMicrophone::new()),
        AudioTranscoder::default(),
        build_client(app_settings)?,
    );
    Ok(spawn_session(runner))
}

async fn analyze(
    app_settings: &AppSettings,
    incoming: IncomingFile,
    json: bool,
) -> Result<ExitCode> {
    let (handle, mut ui, task) = start_session(app_settings)?;

    send(&handle, Event::FileSelected(incoming)).await?;
    let code = submit_and_report(app_settings, &handle, &mut ui, json).await?;

    send(&handle, Event::Exit).await?;
    let _ = task.await;
    Ok(code)
}

async fn record(app_settings: &AppSettings, seconds: Option<u64>, json: bool) -> Result<ExitCode> {
    let (handle, mut ui, task) = start_session(app_settings)?;

    send(&handle, Event::BeginCapture).await?;
    let started = ui
        .wait_for(|s| matches!(s.capture, CaptureUi::Recording { .. }) || s.capture_error.is_some())
        .await
        .context("Session ended unexpectedly")?
        .clone();

    if let Some(error) = started.capture_error {
        send(&handle, Event::Exit).await?;
        let _ = task.await;
        return Ok(report_error(&error, json));
    }

    match seconds {
        Some(n) => {
            eprintln!("Recording for {}s...", n);
            tokio::time::sleep(Duration::from_secs(n)).await;
        }
        None => {
            eprintln!("Recording... press Enter to stop");
            let mut line = String::new();
            let _ = tokio::task::spawn_blocking(move || std::io::stdin().read_line(&mut line)).await;
        }
    }

    send(&handle, Event::EndCapture).await?;
    let finished = ui
        .wait_for(|s| matches!(s.capture, CaptureUi::Idle))
        .await
        .context("Session ended unexpectedly")?
        .clone();

    let code = match finished.pending {
        Some(pending) if pending.kind == "recorded" => {
            log::info!("Captured {} bytes", pending.bytes);
            submit_and_report(app_settings, &handle, &mut ui, json).await?
        }
        _ => {
            eprintln!("Nothing was captured");
            ExitCode::FAILURE
        }
    };

    send(&handle, Event::Exit).await?;
    let _ = task.await;
    Ok(code)
}

async fn submit_and_report(
    app_settings: &AppSettings,
    handle: &StateLoopHandle,
    ui: &mut watch::Receiver<UiState>,
    json: bool,
) -> Result<ExitCode> {
    send(
        handle,
        Event::SubmitRequested {
            language_hint: app_settings.language_hint.clone(),
        },
    )
    .await?;

    let settled = ui
        .wait_for(|s| matches!(s.analysis, AnalysisUi::Result(_) | AnalysisUi::Error(_)))
        .await
        .context("Session ended unexpectedly")?
        .clone();

    match settled.analysis {
        AnalysisUi::Result(result) => {
            if json {
                println!("{}", serde_json::to_string(&result)?);
            } else {
                println!("Type:       {}", result.kind);
                println!("Confidence: {}", result.confidence);
                println!("Language:   {}", result.language);
            }
            Ok(ExitCode::SUCCESS)
        }
        AnalysisUi::Error(error) => Ok(report_error(&error, json)),
        _ => Ok(ExitCode::FAILURE),
    }
}

async fn send(handle: &StateLoopHandle, event: Event) -> Result<()> {
    handle
        .send(event)
        .await
        .map_err(|_| anyhow!("Session loop is not running"))
}

fn report_error(error: &ErrorUi, json: bool) -> ExitCode {
    if json {
        match serde_json::to_string(error) {
            Ok(s) => println!("{}", s),
            Err(e) => log::error!("Failed to serialize error: {}", e),
        }
    } else {
        eprintln!("{}", error.message);
    }
    ExitCode::FAILURE
}
