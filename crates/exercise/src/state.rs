//! Per-session rep-counting state.

use repcoach_pose::Side;
use serde::{Deserialize, Serialize};

use crate::Exercise;

/// Position within a rep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Up,
    Down,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Form defects tracked with a consecutive-frame counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    ElbowDrift,
    Shrug,
    Lean,
    KneeInward,
    LeanForward,
    LiftTooHigh,
}

impl DefectKind {
    pub const ALL: [DefectKind; 6] = [
        DefectKind::ElbowDrift,
        DefectKind::Shrug,
        DefectKind::Lean,
        DefectKind::KneeInward,
        DefectKind::LeanForward,
        DefectKind::LiftTooHigh,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Consecutive defective-frame count per defect kind, plus whether the
/// current run has already been reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefectCounters {
    counts: [u32; DefectKind::ALL.len()],
    reported: [bool; DefectKind::ALL.len()],
}

impl DefectCounters {
    pub fn get(&self, kind: DefectKind) -> u32 {
        self.counts[kind.slot()]
    }

    /// Count a defective frame or reset on a compliant one. Returns the new count.
    pub fn record(&mut self, kind: DefectKind, defective: bool) -> u32 {
        let idx = kind.slot();
        if defective {
            self.counts[idx] = self.counts[idx].saturating_add(1);
        } else {
            self.counts[idx] = 0;
            self.reported[idx] = false;
        }
        self.counts[idx]
    }

    /// Claim the report for the current run once it is `threshold` frames long.
    ///
    /// Returns true at most once per run. A run that reached the threshold
    /// without being claimed stays claimable until a compliant frame ends it.
    pub fn take_report(&mut self, kind: DefectKind, threshold: u32) -> bool {
        let idx = kind.slot();
        if self.counts[idx] >= threshold && !self.reported[idx] {
            self.reported[idx] = true;
            true
        } else {
            false
        }
    }

    pub fn reset_all(&mut self) {
        self.counts = Default::default();
        self.reported = Default::default();
    }

    pub fn is_clear(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefectKind, u32)> + '_ {
        DefectKind::ALL.into_iter().map(|k| (k, self.get(k)))
    }
}

/// Mutable state of one exercise session.
///
/// Owned by the frame loop and advanced by exactly one rule module per
/// processed frame.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Completed reps. Only grows, at most by one per frame.
    pub rep_count: u32,
    pub stage: Option<Stage>,
    pub active_exercise: Exercise,
    /// Tracked body side for single-side joints.
    pub side: Side,
    /// Set once the start posture is observed; cleared only by a switch.
    pub ready_position_confirmed: bool,
    pub consecutive_good_reps: u32,
    pub defect_counters: DefectCounters,
    /// Wall-clock ms of the last spoken cue. Survives exercise switches.
    pub last_feedback_at_ms: Option<i64>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Exercise::default(), Side::default())
    }
}

impl SessionState {
    pub fn new(exercise: Exercise, side: Side) -> Self {
        Self {
            rep_count: 0,
            stage: None,
            active_exercise: exercise,
            side,
            ready_position_confirmed: false,
            consecutive_good_reps: 0,
            defect_counters: DefectCounters::default(),
            last_feedback_at_ms: None,
        }
    }

    /// Select a new exercise and reset everything except side and cooldown.
    pub fn switch_exercise(&mut self, exercise: Exercise) {
        self.active_exercise = exercise;
        self.rep_count = 0;
        self.stage = None;
        self.ready_position_confirmed = false;
        self.consecutive_good_reps = 0;
        self.defect_counters.reset_all();
    }

    pub fn stage_name(&self) -> Option<&'static str> {
        self.stage.map(|s| s.as_str())
    }
}
