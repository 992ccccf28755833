use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facelens_core::{FrameAnalyzer, FrameSource};
use tracing_subscriber::EnvFilter;

mod config;
mod replay;
mod session;

use replay::{Recording, ReplayOptions};

#[derive(Parser)]
#[command(name = "facelens", version, about = "Per-frame face health and metrics analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a recorded landmark stream, printing one JSON result per line
    Replay {
        /// JSON-lines recording of per-frame inference output
        recording: PathBuf,
        /// Directory of frame images used for brightness, matched by sorted name
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Stream frame rate of the recording
        #[arg(long)]
        fps: Option<f64>,
        /// Pace frames at the stream frame rate
        #[arg(long)]
        realtime: bool,
        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            recording,
            frames,
            fps,
            realtime,
            config,
        } => replay(recording, frames, fps, realtime, config).await,
        Command::Config { config } => {
            let config = config::load(config.as_deref())?;
            let text = toml::to_string_pretty(&config).context("failed to render config")?;
            print!("{text}");
            Ok(())
        }
    }
}

async fn replay(
    recording: PathBuf,
    frames: Option<PathBuf>,
    fps: Option<f64>,
    realtime: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = config::load(config_path.as_deref())?;
    let recording = Recording::load(&recording)?;

    // Pacing needs a rate even when the recording does not state one
    let frame_rate = match (fps, realtime) {
        (Some(rate), _) => Some(rate),
        (None, true) => Some(config.default_stream_frame_rate),
        (None, false) => None,
    };
    let (engine, source) = recording.into_replay(ReplayOptions {
        frames_dir: frames,
        frame_rate,
        realtime,
    })?;

    let analyzer = FrameAnalyzer::new(engine, &config, source.frame_rate())?;
    tracing::info!(
        sampling_fps = config.sampling_frame_rate,
        realtime,
        "facelens replay starting"
    );

    let mut session = session::spawn_session(analyzer, source)?;
    let control = session.control();
    let mut stdout = std::io::stdout().lock();
    let mut interrupted = false;

    loop {
        tokio::select! {
            next = session.next_result() => {
                let Some(result) = next else { break };
                let line = serde_json::to_string(&result).context("failed to encode result")?;
                writeln!(stdout, "{line}")?;
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal?;
                tracing::info!("interrupt received, stopping session");
                control.stop();
                interrupted = true;
            }
        }
    }
    stdout.flush()?;
    drop(stdout);

    let stats = session.finish().await?;
    tracing::info!(
        frames = stats.frames_seen,
        skipped = stats.frames_skipped,
        analyzed = stats.frames_analyzed,
        healthy = stats.healthy,
        inference_failures = stats.inference_failures,
        "facelens replay finished"
    );
    Ok(())
}
