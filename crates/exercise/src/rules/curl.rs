//! Bicep curl: elbow angle between shoulder, elbow and wrist.

use repcoach_pose::{angle_at, tilt_from_vertical, BodyPoint, PoseLandmarks, Side};

use super::{DefectSignal, ExerciseRule, FrameReading, MotionProfile, Threshold};
use crate::{CurlSettings, DefectKind, Exercise, Stage};

pub struct CurlRule {
    settings: CurlSettings,
    profile: MotionProfile,
}

impl CurlRule {
    pub fn new(settings: CurlSettings) -> Self {
        let profile = MotionProfile {
            ready: Threshold::Above(settings.ready_angle),
            arm: Threshold::Above(settings.arm_angle),
            complete: Threshold::Below(settings.complete_angle),
            armed_stage: Stage::Down,
            rest_stage: Stage::Up,
            start_cue: "Start curling",
            ready_hint: "Extend arm fully",
            rep_feedback: "✓ GOOD REP",
        };
        Self { settings, profile }
    }
}

impl Default for CurlRule {
    fn default() -> Self {
        Self::new(CurlSettings::default())
    }
}

impl ExerciseRule for CurlRule {
    fn exercise(&self) -> Exercise {
        Exercise::Curl
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
        let (shoulder, elbow, wrist) = landmarks.triple(
            [
                BodyPoint::shoulder(side),
                BodyPoint::elbow(side),
                BodyPoint::wrist(side),
            ],
            min_visibility,
        )?;
        let angle = angle_at(&shoulder, &elbow, &wrist);

        let drift = (elbow.x - shoulder.x).abs() > self.settings.elbow_drift_max;
        let lean = landmarks
            .get(BodyPoint::hip(side), min_visibility)
            .map(|hip| tilt_from_vertical(hip, &shoulder) > self.settings.lean_max_deg);

        Some(FrameReading {
            angle,
            defects: vec![
                DefectSignal::new(
                    DefectKind::ElbowDrift,
                    Some(drift),
                    "⚠ ELBOW OUT",
                    "Keep elbow tucked",
                ),
                DefectSignal::new(
                    DefectKind::Lean,
                    lean,
                    "⚠ STOP SWINGING",
                    "Keep your torso still",
                ),
            ],
        })
    }
}
