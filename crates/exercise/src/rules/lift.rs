//! Lateral arm lift: shoulder angle between hip, shoulder and elbow.

use repcoach_pose::{angle_at, BodyPoint, Landmark, PoseLandmarks, Side};

use super::{DefectSignal, ExerciseRule, FrameReading, MotionProfile, Threshold};
use crate::{DefectKind, Exercise, LiftSettings, Stage};

/// Below this shoulder width the user is side-on and shrugging cannot be judged.
const MIN_SHOULDER_WIDTH: f32 = 0.05;

pub struct LiftRule {
    settings: LiftSettings,
    profile: MotionProfile,
}

impl LiftRule {
    pub fn new(settings: LiftSettings) -> Self {
        let profile = MotionProfile {
            ready: Threshold::Below(settings.ready_angle),
            arm: Threshold::Above(settings.arm_angle),
            complete: Threshold::Below(settings.complete_angle),
            armed_stage: Stage::Down,
            rest_stage: Stage::Up,
            start_cue: "Lift arms",
            ready_hint: "Arms down",
            rep_feedback: "✓ GOOD LIFT",
        };
        Self { settings, profile }
    }

    fn shrugging(
        &self,
        landmarks: &PoseLandmarks,
        side: Side,
        shoulder: &Landmark,
        min_visibility: f32,
    ) -> Option<bool> {
        let ear = landmarks.get(BodyPoint::ear(side), min_visibility)?;
        let left = landmarks.get(BodyPoint::LeftShoulder, min_visibility)?;
        let right = landmarks.get(BodyPoint::RightShoulder, min_visibility)?;
        let width = (left.x - right.x).abs();
        if width < MIN_SHOULDER_WIDTH {
            return None;
        }
        Some(shoulder.y - ear.y < self.settings.shrug_ratio * width)
    }
}

impl Default for LiftRule {
    fn default() -> Self {
        Self::new(LiftSettings::default())
    }
}

impl ExerciseRule for LiftRule {
    fn exercise(&self) -> Exercise {
        Exercise::Lift
    }

    fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    fn read(
        &self,
        landmarks: &PoseLandmarks,
        side: Side,
        min_visibility: f32,
    ) -> Option<FrameReading> {
        let (hip, shoulder, elbow) = landmarks.triple(
            [
                BodyPoint::hip(side),
                BodyPoint::shoulder(side),
                BodyPoint::elbow(side),
            ],
            min_visibility,
        )?;
        let angle = angle_at(&hip, &shoulder, &elbow);

        Some(FrameReading {
            angle,
            defects: vec![
                DefectSignal::new(
                    DefectKind::LiftTooHigh,
                    Some(angle > self.settings.too_high_angle),
                    "⚠ TOO HIGH",
                    "Stop at shoulder height",
                ),
                DefectSignal::new(
                    DefectKind::Shrug,
                    self.shrugging(landmarks, side, &shoulder, min_visibility),
                    "⚠ SHRUGGING",
                    "Relax your shoulders",
                ),
            ],
        })
    }
}
