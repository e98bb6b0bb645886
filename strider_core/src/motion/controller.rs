use log::trace;

use super::state::DriveState;
use crate::datatype::{AbsoluteSpeed, Direction};
use crate::math;
use crate::utility::{PidController, PidGains, EPSILON};

/// The four-axis PID bank closing the loop between ramped setpoints and
/// measured body velocities.
///
/// Vx/Vy/W correct the measured velocity errors; the heading controller
/// steers toward `desired_heading` through the shortest arc. Assigning
/// gains resets all four controllers, which happens at the top of every
/// `set_speed_while`.
#[derive(Debug, Default)]
pub struct DriveController {
    vx: PidController,
    vy: PidController,
    omega: PidController,
    heading: PidController,
}

impl DriveController {
    pub fn set_gains(&mut self, vx: PidGains, vy: PidGains, omega: PidGains, heading: PidGains) {
        self.vx.set_gains(vx);
        self.vy.set_gains(vy);
        self.omega.set_gains(omega);
        self.heading.set_gains(heading);
    }

    /// Signed shortest-arc heading error and its PID correction.
    fn heading_correction(&mut self, state: &DriveState, direction: Direction) -> f32 {
        let desired = state.desired_heading * direction.sign();
        let magnitude = math::minimal_angle_difference(desired, state.current_heading);
        let error = magnitude * math::signf(desired - state.current_heading);
        let correction = self.heading.calculate(error);
        trace!(
            "heading error {error:.4} rad (|arc| {magnitude:.4}), correction {correction:.4}"
        );
        correction
    }

    /// Pick the angular command: explicit rotation intent passes through
    /// with its velocity correction; otherwise the heading controller owns
    /// the axis.
    fn combine_to_omega(
        state: &DriveState,
        setpoint: &AbsoluteSpeed,
        omega_correction: f32,
        heading_correction: f32,
    ) -> f32 {
        let has_rotation = setpoint.angular_rad.abs() > EPSILON;
        let targets_heading = state.desired_heading.abs() > EPSILON;
        if has_rotation && !targets_heading {
            return setpoint.angular_rad + omega_correction;
        }
        heading_correction
    }

    /// One control tick: returns the corrected (vx, vy, ω) command for the
    /// ramped setpoint against the measured body velocities.
    pub fn calculate(
        &mut self,
        state: &DriveState,
        direction: Direction,
        setpoint: &AbsoluteSpeed,
        vx_measured: f32,
        vy_measured: f32,
        omega_measured: f32,
    ) -> (f32, f32, f32) {
        let heading_correction = self.heading_correction(state, direction);

        let vx_error = setpoint.forward_ms - vx_measured;
        let vy_error = setpoint.strafe_ms - vy_measured;
        let omega_error = setpoint.angular_rad - omega_measured;

        let vx_correction = self.vx.calculate(vx_error);
        let vy_correction = self.vy.calculate(vy_error);
        let omega_correction = self.omega.calculate(omega_error);
        trace!(
            "velocity errors ({vx_error:.4}, {vy_error:.4}, {omega_error:.4}), corrections \
             ({vx_correction:.4}, {vy_correction:.4}, {omega_correction:.4})"
        );

        (
            setpoint.forward_ms + vx_correction,
            setpoint.strafe_ms + vy_correction,
            Self::combine_to_omega(state, setpoint, omega_correction, heading_correction),
        )
    }
}
