use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use currency_announcer::api::{ApiServer, ApiState};
use currency_announcer::audio;
use currency_announcer::speech::{
    ElevenLabsBackend, EspeakEngine, NoticeLevel, SpeechEngine, select_voice,
};
use currency_announcer::{
    Announcement, AnnouncementOutcome, Config, ImageUpload, Orchestrator, RoboflowClient,
    SpeechAnnouncer,
};

/// Announcer - detect currency notes in images and speak the result
#[derive(Parser)]
#[command(name = "announcer", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect currency in one or more images (png, jpg, jpeg, webp)
    Detect {
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory for annotated images
        #[arg(short, long, env = "ANNOUNCER_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Speak text through the fallback chain
    Speak {
        /// Text to speak
        #[arg(default_value = "The detected currency is 500")]
        text: String,
    },
    /// List remote and local voices
    Voices,
    /// Serve the HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "ANNOUNCER_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,currency_announcer=info",
        1 => "info,currency_announcer=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Detect { files, output_dir } => detect(config, files, output_dir).await,
        Command::Speak { text } => speak(&config, &text).await,
        Command::Voices => voices(&config).await,
        Command::Serve { port } => serve(config, port).await,
    }
}

/// Construct the orchestrator and its clients once
fn build_orchestrator(config: &Config, output_dir: PathBuf) -> anyhow::Result<Orchestrator> {
    let inference = Arc::new(RoboflowClient::new(&config.inference)?);
    let sink = audio::sink_from_config(&config.audio)?;
    let announcer = SpeechAnnouncer::from_config(&config.speech, sink);

    tracing::info!(chain = ?announcer.chain(), "speech chain ready");

    Ok(Orchestrator::new(inference, announcer, output_dir))
}

async fn detect(
    config: Config,
    files: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output_dir)?;

    let uploads = files
        .iter()
        .map(|path| ImageUpload::from_path(path))
        .collect::<currency_announcer::Result<Vec<_>>>()?;

    let orchestrator = build_orchestrator(&config, output_dir)?;
    let interactions = orchestrator.process_many(uploads).await?;

    for interaction in interactions {
        println!("---");
        match &interaction.annotated_path {
            Some(path) => println!("Annotated: {}", path.display()),
            None => println!("Annotated: (not available for {})", interaction.name),
        }
        println!("Detected currency: {}", interaction.label);
        print_announcement(&interaction.announcement);
    }

    Ok(())
}

async fn speak(config: &Config, text: &str) -> anyhow::Result<()> {
    let sink = audio::sink_from_config(&config.audio)?;
    let announcer = SpeechAnnouncer::from_config(&config.speech, sink);

    let announcement = announcer.announce(text).await;
    print_announcement(&announcement);

    Ok(())
}

fn print_announcement(announcement: &Announcement) {
    for notice in announcement.notices() {
        match notice.level {
            NoticeLevel::Info => println!("info: {}", notice.message),
            NoticeLevel::Warning => println!("warning: {}", notice.message),
        }
    }

    match &announcement.outcome {
        AnnouncementOutcome::Played { backend } => println!("Spoken via {backend}"),
        AnnouncementOutcome::Unverified { backend, markup } => {
            println!("Audio handed to client via {backend}:");
            println!("{markup}");
        }
        AnnouncementOutcome::Silent { .. } => println!("No audio"),
    }
}

async fn voices(config: &Config) -> anyhow::Result<()> {
    let remote = ElevenLabsBackend::new(
        &config.speech.elevenlabs,
        audio::sink_from_config(&config.audio)?,
    );

    println!("Remote voices:");
    match remote.list_voices().await {
        Ok(voices) => {
            for voice in voices {
                println!("  {:<24} {}", voice.name, voice.voice_id);
            }
        }
        Err(e) => println!("  unavailable: {e}"),
    }

    let engine = EspeakEngine::new(config.speech.engine_binary.clone());
    let local = tokio::task::spawn_blocking(move || engine.voices()).await?;

    println!("Local voices:");
    match local {
        Ok(voices) => {
            let selected = select_voice(&voices).map(|v| v.id.clone());
            for voice in &voices {
                let marker = if selected.as_deref() == Some(voice.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    " {marker} {:<12} {:<32} {}",
                    voice.id,
                    voice.name.as_deref().unwrap_or("-"),
                    voice.gender.as_deref().unwrap_or("-")
                );
            }
            if selected.is_none() {
                println!("  (no female voice found, engine default will be used)");
            }
        }
        Err(e) => println!("  unavailable: {e}"),
    }

    Ok(())
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.port);
    std::fs::create_dir_all(&config.output_dir)?;

    let orchestrator = build_orchestrator(&config, config.output_dir.clone())?;
    let server = ApiServer::new(ApiState::new(orchestrator), port);

    tracing::info!(port, "currency announcer ready");
    server.run().await?;

    Ok(())
}
