use crate::datatype::AbsoluteSpeed;

/// Per-device drive state: headings and the slew-limited setpoints.
///
/// Headings are radians, positive clockwise. The ramped values are the
/// last accel-limited setpoints actually fed to the PID bank, distinct from
/// the commanded targets.
#[derive(Debug, Clone, Default)]
pub struct DriveState {
    pub current_heading: f32,
    pub desired_heading: f32,
    pub ramped_forward_ms: f32,
    pub ramped_strafe_ms: f32,
    pub ramped_omega_rad: f32,
}

/// Move `current` toward `target` by at most `max_delta`.
pub(crate) fn slew(current: f32, target: f32, max_delta: f32) -> f32 {
    current + (target - current).clamp(-max_delta, max_delta)
}

impl DriveState {
    pub fn reset_ramps(&mut self) {
        self.ramped_forward_ms = 0.0;
        self.ramped_strafe_ms = 0.0;
        self.ramped_omega_rad = 0.0;
    }

    /// Re-zero the heading frame so the next motion composes with whatever
    /// error the previous one left behind.
    pub fn retarget_heading(&mut self) {
        self.desired_heading -= self.current_heading;
        self.current_heading = 0.0;
    }

    /// Advance each ramped axis toward `target`, bounded by the per-axis
    /// acceleration limits over `dt`.
    pub fn ramp_towards(&mut self, target: &AbsoluteSpeed, max_accel: (f32, f32, f32), dt: f32) {
        let (forward_accel, strafe_accel, angular_accel) = max_accel;
        self.ramped_forward_ms = slew(
            self.ramped_forward_ms,
            target.forward_ms,
            forward_accel * dt,
        );
        self.ramped_strafe_ms = slew(self.ramped_strafe_ms, target.strafe_ms, strafe_accel * dt);
        self.ramped_omega_rad = slew(
            self.ramped_omega_rad,
            target.angular_rad,
            angular_accel * dt,
        );
    }

    /// The ramped setpoint as one value.
    pub fn ramped_speed(&self) -> AbsoluteSpeed {
        AbsoluteSpeed::new(
            self.ramped_forward_ms,
            self.ramped_strafe_ms,
            self.ramped_omega_rad,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ramp_is_acceleration_bounded() {
        let mut state = DriveState::default();
        let target = AbsoluteSpeed::new(1.0, -1.0, 2.0);
        let accel = (0.5, 0.5, 1.0);
        let dt = 0.1;

        for _ in 0..40 {
            let before = (
                state.ramped_forward_ms,
                state.ramped_strafe_ms,
                state.ramped_omega_rad,
            );
            state.ramp_towards(&target, accel, dt);
            assert!((state.ramped_forward_ms - before.0).abs() <= accel.0 * dt + 1e-6);
            assert!((state.ramped_strafe_ms - before.1).abs() <= accel.1 * dt + 1e-6);
            assert!((state.ramped_omega_rad - before.2).abs() <= accel.2 * dt + 1e-6);
        }
        // Long enough to converge.
        assert_relative_eq!(state.ramped_forward_ms, 1.0, epsilon = 1e-5);
        assert_relative_eq!(state.ramped_strafe_ms, -1.0, epsilon = 1e-5);
        assert_relative_eq!(state.ramped_omega_rad, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_retarget_preserves_heading_error() {
        let mut state = DriveState {
            current_heading: 0.4,
            desired_heading: 1.0,
            ..Default::default()
        };
        let error = state.desired_heading - state.current_heading;
        state.retarget_heading();
        assert_relative_eq!(state.desired_heading - state.current_heading, error);
        assert_relative_eq!(state.current_heading, 0.0);
    }

    #[test]
    fn test_reset_ramps() {
        let mut state = DriveState {
            ramped_forward_ms: 0.3,
            ramped_strafe_ms: 0.1,
            ramped_omega_rad: -0.2,
            ..Default::default()
        };
        state.reset_ramps();
        assert_eq!(state.ramped_speed(), AbsoluteSpeed::default());
    }
}
