//! Joint angle geometry.

use crate::Landmark;

/// Angle in degrees at vertex `b` between rays `b→a` and `b→c`.
///
/// Always finite and within `[0, 180]`. Zero-length rays resolve to a
/// direction of 0 rad, and non-finite input yields 0.
pub fn angle_at(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut angle = (radians.to_degrees()).abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    if angle.is_finite() {
        angle.clamp(0.0, 180.0)
    } else {
        0.0
    }
}

/// Deviation in degrees of the segment `lower→upper` from straight up.
///
/// 0 means `upper` is directly above `lower` in image coordinates.
pub fn tilt_from_vertical(lower: &Landmark, upper: &Landmark) -> f32 {
    let above = Landmark::new(lower.x, lower.y - 1.0);
    angle_at(upper, lower, &above)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Landmark {
        Landmark::new(x, y)
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_right_angle() {
        assert_close(angle_at(&p(0.0, 1.0), &p(0.0, 0.0), &p(1.0, 0.0)), 90.0);
    }

    #[test]
    fn test_straight_line() {
        assert_close(angle_at(&p(0.0, 0.0), &p(0.5, 0.5), &p(1.0, 1.0)), 180.0);
    }

    #[test]
    fn test_folded_reflex_angle() {
        // Raw atan2 difference is 270°, folded to 90°.
        assert_close(angle_at(&p(-1.0, -1.0), &p(0.0, 0.0), &p(-1.0, 1.0)), 90.0);
    }

    #[test]
    fn test_range_and_symmetry() {
        let coords = [-1.0, -0.3, 0.0, 0.2, 0.9];
        for &ax in &coords {
            for &ay in &coords {
                for &cx in &coords {
                    for &cy in &coords {
                        let a = p(ax, ay);
                        let b = p(0.1, -0.2);
                        let c = p(cx, cy);
                        let forward = angle_at(&a, &b, &c);
                        let backward = angle_at(&c, &b, &a);
                        assert!((0.0..=180.0).contains(&forward));
                        assert_close(forward, backward);
                    }
                }
            }
        }
    }

    #[test]
    fn test_degenerate_input_is_finite() {
        let same = p(0.4, 0.4);
        let angle = angle_at(&same, &same, &same);
        assert!(angle.is_finite());
        assert!((0.0..=180.0).contains(&angle));

        let near = p(0.4 + f32::EPSILON, 0.4);
        assert!(angle_at(&near, &same, &p(0.9, 0.4)).is_finite());
    }

    #[test]
    fn test_nan_input_is_zero() {
        let nan = p(f32::NAN, 0.0);
        assert_eq!(angle_at(&nan, &p(0.0, 0.0), &p(1.0, 0.0)), 0.0);
    }

    #[test]
    fn test_tilt_from_vertical() {
        assert_close(tilt_from_vertical(&p(0.5, 0.6), &p(0.5, 0.3)), 0.0);
        assert_close(tilt_from_vertical(&p(0.5, 0.6), &p(0.8, 0.6)), 90.0);
    }
}
