//! Body pose landmarks and joint geometry.
//!
//! Landmarks follow the 33-point body topology produced by common pose
//! landmark models. Coordinates are normalized to the frame (`0..1`, `y`
//! grows downward).

mod detector;
mod geometry;

pub use detector::{PoseDetector, PoseError, Result};
pub use geometry::{angle_at, tilt_from_vertical};

use serde::{Deserialize, Serialize};

/// Number of landmarks in the body topology.
pub const LANDMARK_COUNT: usize = 33;

/// A single detected body point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    /// Detector confidence that the point is visible (0..1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Finite coordinates and visibility at or above `min_visibility`.
    pub fn is_usable(&self, min_visibility: f32) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.visibility.map_or(true, |v| v >= min_visibility)
    }
}

/// Left or right half of the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named indices of the body topology used by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BodyPoint {
    Nose = 0,
    LeftEar = 7,
    RightEar = 8,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
}

impl BodyPoint {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn ear(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftEar,
            Side::Right => Self::RightEar,
        }
    }

    pub fn shoulder(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftShoulder,
            Side::Right => Self::RightShoulder,
        }
    }

    pub fn elbow(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftElbow,
            Side::Right => Self::RightElbow,
        }
    }

    pub fn wrist(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftWrist,
            Side::Right => Self::RightWrist,
        }
    }

    pub fn hip(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftHip,
            Side::Right => Self::RightHip,
        }
    }

    pub fn knee(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftKnee,
            Side::Right => Self::RightKnee,
        }
    }

    pub fn ankle(side: Side) -> Self {
        match side {
            Side::Left => Self::LeftAnkle,
            Side::Right => Self::RightAnkle,
        }
    }
}

/// Landmarks of the most prominent person in one frame.
///
/// Read-only snapshot; a rule module borrows it for the duration of one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseLandmarks {
    points: Vec<Landmark>,
}

impl PoseLandmarks {
    /// Wrap detector output. Points beyond the topology are discarded.
    pub fn new(mut points: Vec<Landmark>) -> Self {
        points.truncate(LANDMARK_COUNT);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Look up a point, treating absent, non-finite or low-confidence points as missing.
    pub fn get(&self, point: BodyPoint, min_visibility: f32) -> Option<&Landmark> {
        self.points
            .get(point.index())
            .filter(|l| l.is_usable(min_visibility))
    }

    /// Look up three points at once; `None` if any is missing.
    pub fn triple(
        &self,
        points: [BodyPoint; 3],
        min_visibility: f32,
    ) -> Option<(Landmark, Landmark, Landmark)> {
        let [a, b, c] = points;
        Some((
            *self.get(a, min_visibility)?,
            *self.get(b, min_visibility)?,
            *self.get(c, min_visibility)?,
        ))
    }

    pub fn set(&mut self, point: BodyPoint, landmark: Landmark) {
        let idx = point.index();
        if self.points.len() <= idx {
            self.points.resize(idx + 1, Landmark::new(f32::NAN, f32::NAN));
        }
        self.points[idx] = landmark;
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_index_is_none() {
        let pose = PoseLandmarks::new(vec![Landmark::new(0.5, 0.5); 12]);
        assert!(pose.get(BodyPoint::LeftShoulder, 0.0).is_some());
        assert!(pose.get(BodyPoint::LeftElbow, 0.0).is_none());
    }

    #[test]
    fn test_set_pads_with_unusable_points() {
        let mut pose = PoseLandmarks::default();
        pose.set(BodyPoint::LeftKnee, Landmark::new(0.4, 0.7));
        assert_eq!(pose.len(), 26);
        assert!(pose.get(BodyPoint::LeftKnee, 0.0).is_some());
        assert!(pose.get(BodyPoint::LeftHip, 0.0).is_none());
    }

    #[test]
    fn test_low_visibility_is_missing() {
        let mut pose = PoseLandmarks::default();
        pose.set(
            BodyPoint::RightWrist,
            Landmark::new(0.3, 0.3).with_visibility(0.2),
        );
        assert!(pose.get(BodyPoint::RightWrist, 0.5).is_none());
        assert!(pose.get(BodyPoint::RightWrist, 0.1).is_some());
    }

    #[test]
    fn test_truncates_extra_points() {
        let pose = PoseLandmarks::new(vec![Landmark::new(0.1, 0.1); 40]);
        assert_eq!(pose.len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_side_lookup() {
        assert_eq!(BodyPoint::elbow(Side::Left).index(), 13);
        assert_eq!(BodyPoint::elbow(Side::Right).index(), 14);
        assert_eq!(BodyPoint::ankle(Side::Right).index(), 28);
    }

    #[test]
    fn test_landmark_deserialize_minimal() {
        let json = r#"{"x": 0.25, "y": 0.75}"#;
        let l: Landmark = serde_json::from_str(json).unwrap();
        assert_eq!(l.x, 0.25);
        assert_eq!(l.visibility, None);
    }
}
