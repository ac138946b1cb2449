//! Real-time exercise form analyzer.
//!
//! Wires the pieces together: a [`FrameLoop`] pulls frames, a pose detector
//! turns them into landmarks, the [`Analyzer`] runs the active rule module
//! and its [`FeedbackDispatcher`] forwards cues and telemetry to the host.

mod analyzer;
mod clock;
mod config;
mod constants;
mod dispatcher;
mod frame_loop;

pub use analyzer::Analyzer;
pub use clock::{Clock, ClockRef, ManualClock, SystemClock};
pub use config::{AnalyzerConfig, ConfigError};
pub use constants::*;
pub use dispatcher::FeedbackDispatcher;
pub use frame_loop::{
    CommandSender, FrameLoop, FrameLoopHandle, FrameSource, ImmediateTicker, IntervalTicker,
    LatestFrame, LoopPhase, SourcePoll, TickOutcome, Ticker,
};
