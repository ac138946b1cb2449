//! Rule modules: one per exercise, bound to [`Exercise`] through [`RuleBook`].

mod curl;
mod lift;
mod motion;
mod squat;

pub use curl::CurlRule;
pub use lift::LiftRule;
pub use motion::{evaluate, DefectSignal, FrameReading, MotionProfile, Threshold};
pub use squat::SquatRule;

use std::collections::HashMap;

use repcoach_pose::{PoseLandmarks, Side};

use crate::{Exercise, ExerciseSettings, SessionState};

/// Spoken cue requested by a rule module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub text: String,
    /// Priority cues bypass the feedback cooldown.
    pub priority: bool,
}

impl Cue {
    pub fn priority(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: true,
        }
    }

    pub fn normal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: false,
        }
    }
}

/// Result of running one rule module over one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// Measured joint angle in degrees, 0 when the joints were not visible.
    pub angle: f32,
    /// On-screen feedback for this frame, empty when there is nothing to show.
    pub feedback: String,
    /// Spoken cues in the order they should be offered to the dispatcher.
    pub cues: Vec<Cue>,
}

impl Observation {
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Settings shared by every rule module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleContext {
    pub defect_frame_threshold: u32,
    pub encouragement_interval: u32,
    pub min_visibility: f32,
}

impl From<&ExerciseSettings> for RuleContext {
    fn from(settings: &ExerciseSettings) -> Self {
        Self {
            defect_frame_threshold: settings.defect_frame_threshold,
            encouragement_interval: settings.encouragement_interval,
            min_visibility: settings.min_visibility,
        }
    }
}

/// Measurement half of a rule module.
///
/// Implementations pick their joints, measure the angle and evaluate their
/// defect predicates. State transitions are shared and live in [`evaluate`].
pub trait ExerciseRule: Send + Sync {
    fn exercise(&self) -> Exercise;

    fn profile(&self) -> &MotionProfile;

    /// `None` when the joints the angle depends on are missing.
    fn read(
        &self,
        landmarks: &PoseLandmarks,
        side: Side,
        min_visibility: f32,
    ) -> Option<FrameReading>;
}

/// Lookup table from exercise to rule module.
pub struct RuleBook {
    rules: HashMap<Exercise, Box<dyn ExerciseRule>>,
    context: RuleContext,
}

impl RuleBook {
    pub fn new(context: RuleContext) -> Self {
        Self {
            rules: HashMap::new(),
            context,
        }
    }

    /// Rule book with every built-in exercise.
    pub fn with_settings(settings: &ExerciseSettings) -> Self {
        let mut book = Self::new(RuleContext::from(settings));
        book.register(Box::new(CurlRule::new(settings.curl.clone())));
        book.register(Box::new(SquatRule::new(settings.squat.clone())));
        book.register(Box::new(LiftRule::new(settings.lift.clone())));
        book
    }

    pub fn register(&mut self, rule: Box<dyn ExerciseRule>) {
        tracing::debug!(exercise = %rule.exercise(), "Registering exercise rule");
        self.rules.insert(rule.exercise(), rule);
    }

    pub fn get(&self, exercise: Exercise) -> Option<&dyn ExerciseRule> {
        self.rules.get(&exercise).map(|r| r.as_ref())
    }

    pub fn supports(&self, exercise: Exercise) -> bool {
        self.rules.contains_key(&exercise)
    }

    pub fn context(&self) -> &RuleContext {
        &self.context
    }

    /// Run the active exercise's rule module over one frame.
    pub fn evaluate(&self, landmarks: &PoseLandmarks, state: &mut SessionState) -> Observation {
        match self.get(state.active_exercise) {
            Some(rule) => evaluate(rule, &self.context, landmarks, state),
            None => {
                tracing::warn!(exercise = %state.active_exercise, "No rule registered");
                Observation::neutral()
            }
        }
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::with_settings(&ExerciseSettings::default())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use repcoach_pose::{BodyPoint, Landmark, PoseLandmarks};

    /// Upright figure facing the camera with both arms hanging straight down.
    pub fn neutral_pose() -> PoseLandmarks {
        let mut pose = PoseLandmarks::default();
        pose.set(BodyPoint::Nose, Landmark::new(0.50, 0.10));
        pose.set(BodyPoint::LeftEar, Landmark::new(0.55, 0.12));
        pose.set(BodyPoint::RightEar, Landmark::new(0.45, 0.12));
        pose.set(BodyPoint::LeftShoulder, Landmark::new(0.60, 0.25));
        pose.set(BodyPoint::RightShoulder, Landmark::new(0.40, 0.25));
        pose.set(BodyPoint::LeftElbow, Landmark::new(0.60, 0.40));
        pose.set(BodyPoint::RightElbow, Landmark::new(0.40, 0.40));
        pose.set(BodyPoint::LeftWrist, Landmark::new(0.60, 0.55));
        pose.set(BodyPoint::RightWrist, Landmark::new(0.40, 0.55));
        pose.set(BodyPoint::LeftHip, Landmark::new(0.58, 0.55));
        pose.set(BodyPoint::RightHip, Landmark::new(0.42, 0.55));
        pose.set(BodyPoint::LeftKnee, Landmark::new(0.58, 0.72));
        pose.set(BodyPoint::RightKnee, Landmark::new(0.42, 0.72));
        pose.set(BodyPoint::LeftAnkle, Landmark::new(0.58, 0.90));
        pose.set(BodyPoint::RightAnkle, Landmark::new(0.42, 0.90));
        pose
    }

    /// Place `end` at `angle_deg` from the ray `vertex→anchor`, `len` away from `vertex`.
    pub fn place_at_angle(
        pose: &mut PoseLandmarks,
        anchor: BodyPoint,
        vertex: BodyPoint,
        end: BodyPoint,
        angle_deg: f32,
        len: f32,
    ) {
        let a = *pose.get(anchor, 0.0).expect("anchor set");
        let v = *pose.get(vertex, 0.0).expect("vertex set");
        let base = (a.y - v.y).atan2(a.x - v.x);
        let theta = base + angle_deg.to_radians();
        pose.set(
            end,
            Landmark::new(v.x + len * theta.cos(), v.y + len * theta.sin()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::neutral_pose;
    use super::*;

    #[test]
    fn test_default_book_covers_every_exercise() {
        let book = RuleBook::default();
        for exercise in Exercise::ALL {
            assert!(book.supports(exercise), "{exercise} not registered");
            assert_eq!(book.get(exercise).map(|r| r.exercise()), Some(exercise));
        }
    }

    #[test]
    fn test_missing_rule_is_neutral() {
        let book = RuleBook::new(RuleContext::from(&ExerciseSettings::default()));
        let mut state = SessionState::default();
        let obs = book.evaluate(&neutral_pose(), &mut state);
        assert_eq!(obs, Observation::neutral());
        assert!(!state.ready_position_confirmed);
    }
}
