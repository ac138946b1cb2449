//! Recorded pose streams.
//!
//! Input is NDJSON. Frame lines look like
//! `{"type":"FRAME","ts_ms":1200,"landmarks":[{"x":0.5,"y":0.2}, ...]}`
//! (`landmarks` null or absent when nobody was detected). Every other line
//! is handed to the analyzer as a raw host command.

use std::io::BufRead;
use std::time::{Duration, Instant};

use repcoach_application::{CommandSender, ManualClock};
use repcoach_bus::FrameBusSender;
use repcoach_pose::{Landmark, PoseDetector, PoseLandmarks};
use serde::Deserialize;

/// What the replay pushes through the frame bus: the recorded detection.
pub type ReplayFrame = Option<PoseLandmarks>;

#[derive(Debug, PartialEq)]
pub enum InputLine {
    Frame { ts_ms: i64, landmarks: ReplayFrame },
    Command(String),
}

#[derive(Deserialize)]
struct FrameLine {
    ts_ms: i64,
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
}

/// Classify one input line. Blank lines and broken frame lines yield `None`.
pub fn parse_line(line: &str) -> Option<InputLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => return Some(InputLine::Command(line.to_string())),
    };
    if value.get("type").and_then(serde_json::Value::as_str) != Some("FRAME") {
        return Some(InputLine::Command(line.to_string()));
    }

    match serde_json::from_value::<FrameLine>(value) {
        Ok(frame) => Some(InputLine::Frame {
            ts_ms: frame.ts_ms,
            landmarks: frame.landmarks.map(PoseLandmarks::new),
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed frame line");
            None
        }
    }
}

/// "Detector" that hands back what the recording says was detected.
pub struct ReplayDetector;

impl PoseDetector for ReplayDetector {
    type Frame = ReplayFrame;

    fn name(&self) -> &str {
        "replay"
    }

    fn detect(
        &mut self,
        frame: &ReplayFrame,
        _ts_ms: i64,
    ) -> repcoach_pose::Result<Option<PoseLandmarks>> {
        Ok(frame.clone())
    }
}

/// Longest single wait between frames. Longer gaps in the recording (or
/// very slow replay speeds) are cut short and the schedule re-anchored.
pub const MAX_FRAME_WAIT: Duration = Duration::from_secs(5);

/// Maps recording timestamps onto wall-clock delays.
pub struct Pacer {
    speed: f64,
    origin: Option<(i64, Instant)>,
}

impl Pacer {
    /// `speed` 1.0 is real time; 0 disables pacing.
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            origin: None,
        }
    }

    /// How long to wait before releasing a frame stamped `ts_ms`.
    pub fn delay_until(&mut self, ts_ms: i64, now: Instant) -> Duration {
        if self.speed <= 0.0 {
            return Duration::ZERO;
        }
        let (origin_ts, origin_at) = *self.origin.get_or_insert((ts_ms, now));
        let offset_ms = ts_ms.saturating_sub(origin_ts).max(0) as f64 / self.speed;
        let offset = Duration::try_from_secs_f64(offset_ms / 1000.0).unwrap_or(Duration::MAX);
        let delay = origin_at
            .checked_add(offset)
            .map_or(Duration::MAX, |due| due.saturating_duration_since(now));

        if delay > MAX_FRAME_WAIT {
            let resume_at = now.checked_add(MAX_FRAME_WAIT).unwrap_or(now);
            self.origin = Some((ts_ms, resume_at));
            return MAX_FRAME_WAIT;
        }
        delay
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: u64,
    pub frames_dropped: u64,
    pub commands: u64,
}

/// Feed `input` into the analyzer. Blocks; run it off the async runtime.
///
/// `clock` follows the recording's timestamps so the feedback cooldown does
/// not depend on the replay speed.
pub fn pump(
    input: impl BufRead,
    frames: &FrameBusSender<ReplayFrame>,
    commands: &CommandSender,
    clock: &ManualClock,
    speed: f64,
) -> std::io::Result<ReplayStats> {
    let mut pacer = Pacer::new(speed);
    let mut stats = ReplayStats::default();

    for line in input.lines() {
        match parse_line(&line?) {
            Some(InputLine::Frame { ts_ms, landmarks }) => {
                let wait = pacer.delay_until(ts_ms, Instant::now());
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
                clock.set(ts_ms);
                stats.frames += 1;
                if !frames.send(ts_ms, landmarks) {
                    stats.frames_dropped += 1;
                }
            }
            Some(InputLine::Command(raw)) => {
                stats.commands += 1;
                if !commands.send(raw) {
                    tracing::debug!("Frame loop gone, stopping replay");
                    break;
                }
            }
            None => {}
        }
    }

    Ok(stats)
}
