//! Headless analyzer host.
//!
//! Replays a recorded pose stream through the frame loop and prints host
//! messages (SPEAK / STATS) to stdout as NDJSON. Logs go to stderr.

mod replay;
mod stdout_bus;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use repcoach_application::{
    Analyzer, AnalyzerConfig, FrameLoop, FrameLoopHandle, IntervalTicker, LatestFrame,
    ManualClock,
};
use repcoach_bus::{FrameBus, PipelineStatus};
use repcoach_exercise::Exercise;
use tracing_subscriber::EnvFilter;

use replay::{ReplayDetector, ReplayFrame};
use stdout_bus::StdoutEventBus;

#[derive(Parser, Debug)]
#[command(name = "repcoach", about = "Replay a pose stream through the exercise form analyzer")]
struct Args {
    /// NDJSON pose stream (frames and host commands); stdin when omitted
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Analyzer config file (JSON)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Exercise to start with: curl, squat or lift
    #[arg(short, long)]
    exercise: Option<Exercise>,

    /// Frame loop rate; overrides frame_interval_ms from the config
    #[arg(long)]
    fps: Option<u32>,

    /// Replay speed relative to the recording; 0 replays without pacing
    #[arg(long, default_value = "1.0")]
    speed: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,repcoach=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        args.speed.is_finite() && args.speed >= 0.0,
        "--speed must be a non-negative number"
    );

    let mut config = AnalyzerConfig::load_or_default(args.config.as_deref())
        .context("failed to load analyzer config")?;
    if let Some(exercise) = args.exercise {
        config.initial_exercise = exercise;
    }
    if let Some(fps) = args.fps {
        config.frame_interval_ms = u64::from(1000 / fps.max(1)).max(1);
    }
    config.validate()?;

    let clock = Arc::new(ManualClock::new(0));
    let analyzer = Analyzer::new(&config, Arc::new(StdoutEventBus), clock.clone());

    let status = Arc::new(PipelineStatus::new());
    let (frames_tx, frames_rx) = FrameBus::<ReplayFrame>::new().split();
    let frames_rx = frames_rx.context("frame bus receiver already taken")?;
    let source = LatestFrame::new(frames_rx).with_status(status.clone());
    let frame_loop = FrameLoop::new(source, ReplayDetector, analyzer).with_status(status);
    let commands = frame_loop.command_sender();

    let handle = FrameLoopHandle::new();
    let task = handle.start(frame_loop, IntervalTicker::new(config.frame_interval()));

    let speed = args.speed;
    let input = args.input;
    let stats = tokio::task::spawn_blocking(move || -> anyhow::Result<replay::ReplayStats> {
        let stats = match &input {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                replay::pump(BufReader::new(file), &frames_tx, &commands, &clock, speed)?
            }
            None => replay::pump(std::io::stdin().lock(), &frames_tx, &commands, &clock, speed)?,
        };
        // Dropping the sender closes the bus; the loop stops after the last frame.
        drop(frames_tx);
        Ok(stats)
    })
    .await??;

    tracing::info!(
        frames = stats.frames,
        frames_dropped = stats.frames_dropped,
        commands = stats.commands,
        "Input exhausted"
    );

    let frame_loop = task.await?;
    let state = frame_loop.analyzer().state();
    tracing::info!(
        exercise = %state.active_exercise,
        reps = state.rep_count,
        status = ?frame_loop.status().snapshot(),
        "Replay finished"
    );
    Ok(())
}
