//! Squat: knee angle between hip, knee and ankle.

use repcoach_pose::{angle_at, tilt_from_vertical, BodyPoint, PoseLandmarks, Side};

use super::{DefectSignal, ExerciseRule, FrameReading, MotionProfile, Threshold};
use crate::{DefectKind, Exercise, SquatSettings, Stage};

/// Below this ankle separation the camera sees the user side-on and knee
/// tracking cannot be judged.
const MIN_ANKLE_SEPARATION: f32 = 0.05;

pub struct SquatRule {
    settings: SquatSettings,
    profile: MotionProfile,
}

impl SquatRule {
    pub fn new(settings: SquatSettings) -> Self {
        let profile = MotionProfile {
            ready: Threshold::Above(settings.ready_angle),
            arm: Threshold::Below(settings.arm_angle),
            complete: Threshold::Above(settings.complete_angle),
            armed_stage: Stage::Up,
            rest_stage: Stage::Down,
            start_cue: "Start squatting",
            ready_hint: "Stand straight",
            rep_feedback: "✓ GOOD SQUAT",
        };
        Self { settings, profile }
    }

    fn knees_caving(&self, landmarks: &PoseLandmarks, min_visibility: f32) -> Option<bool> {
        let lk = landmarks.get(BodyPoint::LeftKnee, min_visibility)?;
        let rk = landmarks.get(BodyPoint::RightKnee, min_visibility)?;
        let la = landmarks.get(BodyPoint::LeftAnkle, min_visibility)?;
        let ra = landmarks.get(BodyPoint::RightAnkle, min_visibility)?;
        let ankle_gap = (la.x - ra.x).abs();
        if ankle_gap < MIN_ANKLE_SEPARATION {
            return None;
        }
        Some((lk.x - rk.x).abs() < self.settings.knee_inward_ratio * ankle_gap)
    }
}

impl Default for SquatRule {
    fn default() -> Self {
        Self::new(SquatSettings::default())
    }
}

impl ExerciseRule for SquatRule {
    fn exercise(&self) -> Exercise {
        Exercise::Squat
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
        let (hip, knee, ankle) = landmarks.triple(
            [
                BodyPoint::hip(side),
                BodyPoint::knee(side),
                BodyPoint::ankle(side),
            ],
            min_visibility,
        )?;
        let angle = angle_at(&hip, &knee, &ankle);

        let lean_forward = landmarks
            .get(BodyPoint::shoulder(side), min_visibility)
            .map(|shoulder| tilt_from_vertical(&hip, shoulder) > self.settings.lean_forward_max_deg);

        Some(FrameReading {
            angle,
            defects: vec![
                DefectSignal::new(
                    DefectKind::KneeInward,
                    self.knees_caving(landmarks, min_visibility),
                    "⚠ KNEES IN",
                    "Push your knees out",
                ),
                DefectSignal::new(
                    DefectKind::LeanForward,
                    lean_forward,
                    "⚠ CHEST UP",
                    "Keep your chest up",
                ),
            ],
        })
    }
}
