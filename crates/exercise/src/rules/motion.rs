//! Shared readiness, defect and rep-cycle state machine.

use repcoach_pose::PoseLandmarks;

use super::{Cue, ExerciseRule, Observation, RuleContext};
use crate::{DefectKind, SessionState, Stage};

/// Spoken every `encouragement_interval` consecutive good reps.
pub const ENCOURAGEMENT_CUE: &str = "Great work!";

/// Strict angle comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Above(f32),
    Below(f32),
}

impl Threshold {
    pub fn is_met(&self, angle: f32) -> bool {
        match *self {
            Self::Above(limit) => angle > limit,
            Self::Below(limit) => angle < limit,
        }
    }
}

/// Angle thresholds and messages describing one exercise's rep cycle.
///
/// A rep is `rest_stage → armed_stage → rest_stage`: reaching `arm` sets
/// `armed_stage`, and reaching `complete` while armed counts the rep.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfile {
    pub ready: Threshold,
    pub arm: Threshold,
    pub complete: Threshold,
    pub armed_stage: Stage,
    pub rest_stage: Stage,
    /// Priority cue once the start posture is confirmed.
    pub start_cue: &'static str,
    /// On-screen hint while waiting for the start posture.
    pub ready_hint: &'static str,
    /// On-screen feedback for a completed rep.
    pub rep_feedback: &'static str,
}

/// One defect predicate's outcome for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectSignal {
    pub kind: DefectKind,
    pub defective: bool,
    pub feedback: &'static str,
    pub cue: &'static str,
}

impl DefectSignal {
    /// `None` (landmarks missing) counts as compliant.
    pub fn new(
        kind: DefectKind,
        defective: Option<bool>,
        feedback: &'static str,
        cue: &'static str,
    ) -> Self {
        Self {
            kind,
            defective: defective.unwrap_or(false),
            feedback,
            cue,
        }
    }
}

/// What a rule module measured in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReading {
    pub angle: f32,
    /// Defects in descending feedback precedence.
    pub defects: Vec<DefectSignal>,
}

/// Advance `state` by one frame using `rule`'s measurement.
///
/// Never fails: missing joints produce a neutral observation and clear the
/// defect counters, leaving the rest of the state untouched.
pub fn evaluate(
    rule: &dyn ExerciseRule,
    ctx: &RuleContext,
    landmarks: &PoseLandmarks,
    state: &mut SessionState,
) -> Observation {
    let Some(reading) = rule.read(landmarks, state.side, ctx.min_visibility) else {
        state.defect_counters.reset_all();
        return Observation::neutral();
    };
    let profile = rule.profile();
    let angle = reading.angle;

    if !state.ready_position_confirmed {
        if profile.ready.is_met(angle) {
            state.ready_position_confirmed = true;
            state.stage = Some(profile.rest_stage);
            tracing::debug!(exercise = %rule.exercise(), angle, "Start posture confirmed");
            return Observation {
                angle,
                feedback: String::new(),
                cues: vec![Cue::priority(profile.start_cue)],
            };
        }
        return Observation {
            angle,
            feedback: profile.ready_hint.to_string(),
            cues: Vec::new(),
        };
    }

    for signal in &reading.defects {
        state.defect_counters.record(signal.kind, signal.defective);
    }

    if state.stage == Some(profile.armed_stage) && profile.complete.is_met(angle) {
        state.stage = Some(profile.rest_stage);
        state.rep_count += 1;
        state.consecutive_good_reps += 1;
        tracing::debug!(
            exercise = %rule.exercise(),
            reps = state.rep_count,
            streak = state.consecutive_good_reps,
            "Rep completed"
        );

        // Encouragement first: the priority count restarts the cooldown.
        let mut cues = Vec::with_capacity(2);
        if ctx.encouragement_interval > 0
            && state.consecutive_good_reps % ctx.encouragement_interval == 0
        {
            cues.push(Cue::normal(ENCOURAGEMENT_CUE));
        }
        cues.push(Cue::priority(state.rep_count.to_string()));
        // Pending defect reports stay unclaimed and go out on the next frame.
        return Observation {
            angle,
            feedback: profile.rep_feedback.to_string(),
            cues,
        };
    }

    let mut feedback = String::new();
    let mut defect_cues = Vec::new();
    for signal in &reading.defects {
        if state
            .defect_counters
            .take_report(signal.kind, ctx.defect_frame_threshold)
        {
            tracing::debug!(
                defect = ?signal.kind,
                count = state.defect_counters.get(signal.kind),
                "Defect threshold reached"
            );
            state.consecutive_good_reps = 0;
            if feedback.is_empty() {
                feedback = signal.feedback.to_string();
            }
            defect_cues.push(Cue::normal(signal.cue));
        }
    }

    if profile.arm.is_met(angle) {
        state.stage = Some(profile.armed_stage);
    }

    Observation {
        angle,
        feedback,
        cues: defect_cues,
    }
}
