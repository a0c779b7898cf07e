//! Autoplay - narrated autoplayer for an emulated game
//!
//! Usage:
//!   autoplay --config autoplay.toml
//!   autoplay --dump-config > autoplay.toml
//!
//! Runs the tick loop against the configured system bridge. Lines typed on stdin
//! are forwarded to the model as audience suggestions.

use autoplay_llm::OpenAiProvider;
use autoplay_runtime::{
    AudioPlayer, AutoplayConfig, BridgeSystem, CommandPlayer, SharedSession, SilentPlayer,
    TickScheduler,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "autoplay", about = "Narrated autoplayer driven by a multimodal model")]
struct Cli {
    /// Path to config file (TOML)
    #[arg(long, default_value = "autoplay.toml")]
    config: PathBuf,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log narration instead of synthesizing and playing it
    #[arg(long)]
    no_speech: bool,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", AutoplayConfig::default().to_toml());
        return Ok(());
    }

    let _log_guard = init_tracing(cli.log_file.as_deref())?;

    let mut config = AutoplayConfig::load(&cli.config);
    if cli.no_speech {
        config.speech.enabled = false;
    }

    let api_key = cli
        .api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set. Pass --api-key or set the env var."))?;

    let llm = &config.llm;
    let service = Arc::new(
        OpenAiProvider::new(api_key)
            .with_base_url(&llm.base_url)
            .with_model(&llm.model, llm.max_tokens)
            .with_image_detail(&llm.image_detail)
            .with_speech(&llm.speech_model, &llm.voice)
            .with_timeout(config.requests.timeout()),
    );
    let player: Arc<dyn AudioPlayer> = if config.speech.enabled {
        Arc::new(CommandPlayer::new(config.speech.player.clone()))
    } else {
        Arc::new(SilentPlayer)
    };

    let system = BridgeSystem::spawn(&config.system.command)?;
    let mut scheduler = TickScheduler::new(Box::new(system), service, player, &config);
    if let Err(e) = scheduler.restore() {
        tracing::warn!("Could not restore snapshot: {}", e);
    }

    forward_suggestions(scheduler.session().clone());

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after this tick");
            on_signal.cancel();
        }
    });

    scheduler.run(shutdown, cli.ticks).await?;
    Ok(())
}

fn init_tracing(
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "autoplay=info".into());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

fn forward_suggestions(session: Arc<SharedSession>) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!("Audience suggestion: {}", line.trim());
            session.suggestions.push(line);
        }
    });
}
