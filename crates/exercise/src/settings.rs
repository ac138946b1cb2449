//! Tunable thresholds for the rule modules.
//!
//! The defaults are empirical. Every field can be overridden from a partial
//! config file since each level is `#[serde(default)]`.

use serde::{Deserialize, Serialize};

/// Consecutive defective frames before a defect is reported.
pub const DEFAULT_DEFECT_FRAME_THRESHOLD: u32 = 8;

/// Consecutive good reps between encouragement cues.
pub const DEFAULT_ENCOURAGEMENT_INTERVAL: u32 = 5;

/// Landmarks reported below this confidence are treated as missing.
pub const DEFAULT_MIN_VISIBILITY: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseSettings {
    pub defect_frame_threshold: u32,
    pub encouragement_interval: u32,
    /// Landmarks below this visibility are treated as missing.
    pub min_visibility: f32,
    pub curl: CurlSettings,
    pub squat: SquatSettings,
    pub lift: LiftSettings,
}

impl Default for ExerciseSettings {
    fn default() -> Self {
        Self {
            defect_frame_threshold: DEFAULT_DEFECT_FRAME_THRESHOLD,
            encouragement_interval: DEFAULT_ENCOURAGEMENT_INTERVAL,
            min_visibility: DEFAULT_MIN_VISIBILITY,
            curl: CurlSettings::default(),
            squat: SquatSettings::default(),
            lift: LiftSettings::default(),
        }
    }
}

/// Bicep curl, measured at the elbow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurlSettings {
    /// Arm counts as extended (start posture) above this angle.
    pub ready_angle: f32,
    /// Arm extension above this angle arms the rep.
    pub arm_angle: f32,
    /// Flexion below this angle completes the rep.
    pub complete_angle: f32,
    /// Max horizontal elbow-to-shoulder offset, as a fraction of frame width.
    pub elbow_drift_max: f32,
    /// Max torso tilt from vertical in degrees.
    pub lean_max_deg: f32,
}

impl Default for CurlSettings {
    fn default() -> Self {
        Self {
            ready_angle: 150.0,
            arm_angle: 160.0,
            complete_angle: 35.0,
            elbow_drift_max: 0.20,
            lean_max_deg: 20.0,
        }
    }
}

/// Squat, measured at the knee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquatSettings {
    /// Standing tall (start posture) above this angle.
    pub ready_angle: f32,
    /// Knee flexion below this angle arms the rep.
    pub arm_angle: f32,
    /// Standing back up above this angle completes the rep.
    pub complete_angle: f32,
    /// Knees closer than this fraction of ankle separation cave inward.
    pub knee_inward_ratio: f32,
    /// Max torso tilt from vertical in degrees.
    pub lean_forward_max_deg: f32,
}

impl Default for SquatSettings {
    fn default() -> Self {
        Self {
            ready_angle: 165.0,
            arm_angle: 90.0,
            complete_angle: 165.0,
            knee_inward_ratio: 0.70,
            lean_forward_max_deg: 50.0,
        }
    }
}

/// Lateral arm lift, measured at the shoulder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftSettings {
    /// Arms down (start posture) below this angle.
    pub ready_angle: f32,
    /// Raising above this angle arms the rep.
    pub arm_angle: f32,
    /// Lowering below this angle completes the rep.
    pub complete_angle: f32,
    /// Raising above this angle goes past shoulder height.
    pub too_high_angle: f32,
    /// Ear-to-shoulder height below this fraction of shoulder width is a shrug.
    pub shrug_ratio: f32,
}

impl Default for LiftSettings {
    fn default() -> Self {
        Self {
            ready_angle: 20.0,
            arm_angle: 80.0,
            complete_angle: 20.0,
            too_high_angle: 110.0,
            shrug_ratio: 0.35,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"defect_frame_threshold": 4, "curl": {"elbow_drift_max": 0.1}}"#;
        let settings: ExerciseSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.defect_frame_threshold, 4);
        assert_eq!(settings.encouragement_interval, DEFAULT_ENCOURAGEMENT_INTERVAL);
        assert_eq!(settings.curl.elbow_drift_max, 0.1);
        assert_eq!(settings.curl.arm_angle, 160.0);
        assert_eq!(settings.squat, SquatSettings::default());
        assert_eq!(settings.min_visibility, DEFAULT_MIN_VISIBILITY);
    }

    #[test]
    fn test_min_visibility_override() {
        let settings: ExerciseSettings = serde_json::from_str(r#"{"min_visibility": 0.0}"#).unwrap();
        assert_eq!(settings.min_visibility, 0.0);
        assert_eq!(ExerciseSettings::default().min_visibility, 0.5);
    }
}
