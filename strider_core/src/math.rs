//! Small numeric helpers shared by the motion and attitude code.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Quaternion, UnitQuaternion};

/// Linear interpolation between `a` and `b` by `t`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Cosine-eased interpolation between `a` and `b` by `t` in [0, 1].
pub fn ease_in_out(a: f32, b: f32, t: f32) -> f32 {
    lerp(a, b, (1.0 - (t * std::f32::consts::PI).cos()) * 0.5)
}

/// Sign of `value` as -1.0, 0.0 or 1.0.
pub fn signf(value: f32) -> f32 {
    ((value > 0.0) as i32 - (value < 0.0) as i32) as f32
}

/// Magnitude of the shortest arc between two angles, in [0, π].
///
/// Symmetric in its arguments; combine with the sign of the direct
/// difference to recover a signed shortest-arc error.
pub fn minimal_angle_difference(a: f32, b: f32) -> f32 {
    let tau = 2.0 * std::f32::consts::PI;
    let mut angle1 = a % tau;
    if angle1 < 0.0 {
        angle1 += tau;
    }
    let mut angle2 = b % tau;
    if angle2 < 0.0 {
        angle2 += tau;
    }
    let diff = (angle1 - angle2).abs();
    diff.min(tau - diff)
}

/// Extract (roll, pitch, yaw) from a unit quaternion.
///
/// Gimbal lock at ±π/2 pitch is special-cased: roll absorbs the free axis
/// and yaw is reported as zero.
pub fn quaternion_to_euler(q: &Quaternion<f64>) -> (f64, f64, f64) {
    let m = UnitQuaternion::from_quaternion(*q)
        .to_rotation_matrix()
        .into_inner();
    let pitch = (-m[(2, 0)]).asin();

    let (roll, yaw) = if (pitch - FRAC_PI_2).abs() < 1e-6 {
        ((m[(0, 1)]).atan2(m[(0, 2)]), 0.0)
    } else if (pitch + FRAC_PI_2).abs() < 1e-6 {
        ((-m[(0, 1)]).atan2(-m[(0, 2)]), 0.0)
    } else {
        (
            (m[(2, 1)]).atan2(m[(2, 2)]),
            (m[(1, 0)]).atan2(m[(0, 0)]),
        )
    };

    (roll, pitch, yaw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI as PI32;

    #[test]
    fn test_lerp_endpoints() {
        assert_relative_eq!(lerp(2.0, 6.0, 0.0), 2.0);
        assert_relative_eq!(lerp(2.0, 6.0, 1.0), 6.0);
        assert_relative_eq!(lerp(2.0, 6.0, 0.5), 4.0);
    }

    #[test]
    fn test_ease_in_out_endpoints() {
        assert_relative_eq!(ease_in_out(0.0, 1.0, 0.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(ease_in_out(0.0, 1.0, 1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(ease_in_out(0.0, 1.0, 0.5), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_signf() {
        assert_eq!(signf(3.2), 1.0);
        assert_eq!(signf(-0.1), -1.0);
        assert_eq!(signf(0.0), 0.0);
    }

    #[test]
    fn test_minimal_angle_symmetric_and_bounded() {
        let pairs = [
            (0.3_f32, 5.9_f32),
            (-1.0, 1.0),
            (3.0, -3.0),
            (0.0, 2.0 * PI32),
        ];
        for (a, b) in pairs {
            let d1 = minimal_angle_difference(a, b);
            let d2 = minimal_angle_difference(b, a);
            assert_relative_eq!(d1, d2, epsilon = 1e-5);
            assert!((0.0..=PI32 + 1e-6).contains(&d1));
        }
    }

    #[test]
    fn test_minimal_angle_wraps_shortest_arc() {
        // 350° vs 10° is 20° apart, not 340°.
        let d = minimal_angle_difference(350.0_f32.to_radians(), 10.0_f32.to_radians());
        assert_relative_eq!(d, 20.0_f32.to_radians(), epsilon = 1e-5);
    }

    #[test]
    fn test_quaternion_to_euler_identity() {
        let (roll, pitch, yaw) = quaternion_to_euler(&Quaternion::new(1.0, 0.0, 0.0, 0.0));
        assert_relative_eq!(roll, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pitch, 0.0, epsilon = 1e-9);
        assert_relative_eq!(yaw, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_quaternion_to_euler_pure_yaw() {
        let half = 0.25 * std::f64::consts::PI;
        let q = Quaternion::new(half.cos(), 0.0, 0.0, half.sin());
        let (_, _, yaw) = quaternion_to_euler(&q);
        assert_relative_eq!(yaw, std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
    }
}
