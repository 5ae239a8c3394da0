use anyhow::{Context, Result};
use murmur::audio::{CpalMicrophone, CpalSpeaker};
use murmur::integration::{SessionConfig, SessionOrchestrator};
use murmur::session::{NoticeLevel, SessionEvent, Stage};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "MURMUR_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Murmur voice assistant");

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok());
    let config = match &config_path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => SessionConfig::default(),
    }
    .with_env_overrides();

    let speaker = CpalSpeaker::open(config.playback.sample_rate)
        .context("opening the audio output device")?;

    #[allow(unused_mut)]
    let mut builder = SessionOrchestrator::builder()
        .with_microphone(Arc::new(CpalMicrophone::new(config.capture.sample_rate)))
        .with_sink(Arc::new(speaker))
        .with_config(config);

    #[cfg(feature = "livekit")]
    {
        builder = builder.with_room_transport(Arc::new(murmur::room::LiveKitTransport::new()));
    }

    let orchestrator = builder.build().context("building the session")?;

    tokio::spawn(render_events(orchestrator.subscribe()));
    orchestrator.start().await;

    println!("Enter: talk | s: stop recording | c: cancel | q: quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {
                // Rejections are reported as notices
                let _ = orchestrator.begin_turn();
            }
            "s" => {
                if !orchestrator.stop_recording() {
                    println!("Not recording.");
                }
            }
            "c" => {
                if !orchestrator.cancel_turn().await {
                    println!("Nothing to cancel.");
                }
            }
            "q" => break,
            other => println!("Unknown command: {}", other),
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

async fn render_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Display fell behind by {} events", missed);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            SessionEvent::StageChanged { stage, .. } => match stage {
                Stage::Recording => println!("Listening..."),
                Stage::Transcribing => println!("Processing speech..."),
                Stage::Generating => print!("Assistant: "),
                Stage::Playing => println!(),
                _ => {}
            },
            SessionEvent::Transcript { text, .. } => println!("You: {}", text),
            SessionEvent::ReplyDelta { text, .. } => print!("{}", text),
            SessionEvent::RoomState(state) => println!("[room {}]", state),
            SessionEvent::Notice(notice) => match notice.level {
                NoticeLevel::Info => println!("{}", notice.message),
                NoticeLevel::Warning => println!("Warning: {}", notice.message),
                NoticeLevel::Error => println!("Error: {}", notice.message),
            },
        }
        let _ = std::io::stdout().flush();
    }
}
