//! Four-wheel omni (mecanum-style) drive.
//!
//! Wheel ordering throughout the kinematics is front-right, front-left,
//! rear-left, rear-right.

mod calibration;
mod conditions;

pub use calibration::calibrate_ticks_per_revolution;
pub use conditions::{for_forward_distance, for_side_distance};

use std::f32::consts::TAU;

use log::trace;
use serde::{Deserialize, Serialize};

use strider_core::datatype::{
    constant, AbsoluteSpeed, ConditionalFunction, Speed, SpeedFunction,
};
use strider_core::device::{Chassis, Device};
use strider_core::motion::SpeedWhile;
use strider_core::motor::Motor;
use strider_core::utility::MAX_MOTOR_SPEED;

/// A [`Device`] on an omni base.
pub type OmniWheeledDevice = Device<OmniWheeled>;

/// Measured geometry of an omni base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OmniWheeledGeometry {
    pub ticks_per_revolution: f32,
    /// Wheel radius, metres.
    pub wheel_radius: f32,
    /// Distance from chassis centre to each wheel axis, metres.
    pub wheel_distance_from_center: f32,
}

impl Default for OmniWheeledGeometry {
    fn default() -> Self {
        Self {
            ticks_per_revolution: 1582.0,
            wheel_radius: 0.035,
            wheel_distance_from_center: 0.1,
        }
    }
}

/// Inverse kinematics: per-wheel rad/s for a body command.
///
/// Rows of the 4×3 matrix, scaled by 1/r, wheel order FR, FL, RL, RR:
/// `[+1, +1, −L]`, `[+1, −1, +L]`, `[+1, +1, +L]`, `[+1, −1, −L]`.
fn wheel_speeds_rad(speed: &AbsoluteSpeed, radius: f32, center_distance: f32) -> [f32; 4] {
    let (vx, vy, omega) = (speed.forward_ms, speed.strafe_ms, speed.angular_rad);
    let l = center_distance;
    [
        (vx + vy - l * omega) / radius,
        (vx - vy + l * omega) / radius,
        (vx + vy + l * omega) / radius,
        (vx - vy - l * omega) / radius,
    ]
}

/// Forward kinematics: body velocity from per-wheel rad/s.
fn body_velocity(wheels: [f32; 4], radius: f32, center_distance: f32) -> (f32, f32, f32) {
    let [fr, fl, rl, rr] = wheels;
    let vx = (fr + fl + rl + rr) * radius / 4.0;
    let vy = (fr - fl + rl - rr) * radius / 4.0;
    let omega = (-fr + fl + rl - rr) * radius / (4.0 * center_distance);
    (vx, vy, omega)
}

/// Four-wheel omni chassis.
pub struct OmniWheeled {
    pub front_right_motor: Motor,
    pub front_left_motor: Motor,
    pub rear_left_motor: Motor,
    pub rear_right_motor: Motor,
    pub geometry: OmniWheeledGeometry,
    last_ticks: [i32; 4],
    initial_ticks: [i32; 4],
}

impl OmniWheeled {
    pub fn new(
        front_right_motor: Motor,
        front_left_motor: Motor,
        rear_left_motor: Motor,
        rear_right_motor: Motor,
    ) -> Self {
        Self::with_geometry(
            front_right_motor,
            front_left_motor,
            rear_left_motor,
            rear_right_motor,
            OmniWheeledGeometry::default(),
        )
    }

    pub fn with_geometry(
        front_right_motor: Motor,
        front_left_motor: Motor,
        rear_left_motor: Motor,
        rear_right_motor: Motor,
        geometry: OmniWheeledGeometry,
    ) -> Self {
        Self {
            front_right_motor,
            front_left_motor,
            rear_left_motor,
            rear_right_motor,
            geometry,
            last_ticks: [0; 4],
            initial_ticks: [0; 4],
        }
    }

    fn positions(&self) -> [i32; 4] {
        [
            self.front_right_motor.position(),
            self.front_left_motor.position(),
            self.rear_left_motor.position(),
            self.rear_right_motor.position(),
        ]
    }

    fn rad_per_tick(&self) -> f32 {
        TAU / self.geometry.ticks_per_revolution
    }

    /// Wheel angles turned since `begin_motion`, radians, order FR/FL/RL/RR.
    fn wheel_angles(&self) -> [f32; 4] {
        let positions = self.positions();
        let rad_per_tick = self.rad_per_tick();
        std::array::from_fn(|i| (positions[i] - self.initial_ticks[i]) as f32 * rad_per_tick)
    }

    /// Body velocity for a set of wheel speeds in rad/s.
    pub fn speed_by_wheels(&self, wheels: [f32; 4]) -> AbsoluteSpeed {
        let (vx, vy, omega) = body_velocity(
            wheels,
            self.geometry.wheel_radius,
            self.geometry.wheel_distance_from_center,
        );
        AbsoluteSpeed::new(vx, vy, omega)
    }

    /// Body velocity when both wheels of a side spin together, rad/s.
    pub fn speed_by_wheel_sides(&self, left: f32, right: f32) -> AbsoluteSpeed {
        let radius = self.geometry.wheel_radius;
        let forward = (left + right) * radius / 2.0;
        let omega =
            (right - left) * radius / (2.0 * self.geometry.wheel_distance_from_center);
        AbsoluteSpeed::new(forward, 0.0, omega)
    }

    /// Forward distance accumulated since the motion started, metres.
    pub fn driven_distance_forward(&self) -> f32 {
        let [fr, fl, rl, rr] = self.wheel_angles();
        (fr + fl + rl + rr) * self.geometry.wheel_radius / 4.0
    }

    /// Strafe distance accumulated since the motion started, metres.
    pub fn driven_distance_strafe(&self) -> f32 {
        let [fr, fl, rl, rr] = self.wheel_angles();
        (fr - fl + rl - rr) * self.geometry.wheel_radius / 4.0
    }
}

impl Chassis for OmniWheeled {
    fn begin_motion(&mut self) {
        let positions = self.positions();
        self.last_ticks = positions;
        self.initial_ticks = positions;
    }

    fn max_speeds(&self) -> (f32, f32, f32) {
        let omega_wheel_max =
            MAX_MOTOR_SPEED as f32 / self.geometry.ticks_per_revolution * TAU;
        let linear_max = omega_wheel_max * self.geometry.wheel_radius;
        let omega_max = linear_max / self.geometry.wheel_distance_from_center;
        (linear_max, linear_max, omega_max)
    }

    fn apply_kinematics(&mut self, speed: &AbsoluteSpeed) {
        let wheels = wheel_speeds_rad(
            speed,
            self.geometry.wheel_radius,
            self.geometry.wheel_distance_from_center,
        );
        trace!(
            "wheel speeds (FR, FL, RL, RR): ({:.3}, {:.3}, {:.3}, {:.3}) rad/s",
            wheels[0],
            wheels[1],
            wheels[2],
            wheels[3]
        );

        let ticks_per_rad = self.geometry.ticks_per_revolution / TAU;
        self.front_right_motor
            .set_velocity((wheels[0] * ticks_per_rad).round() as i32);
        self.front_left_motor
            .set_velocity((wheels[1] * ticks_per_rad).round() as i32);
        self.rear_left_motor
            .set_velocity((wheels[2] * ticks_per_rad).round() as i32);
        self.rear_right_motor
            .set_velocity((wheels[3] * ticks_per_rad).round() as i32);
    }

    fn wheel_velocities(&mut self, dt: f32) -> (f32, f32, f32) {
        let positions = self.positions();
        let rad_per_tick = self.rad_per_tick();
        let displacements: [f32; 4] =
            std::array::from_fn(|i| (positions[i] - self.last_ticks[i]) as f32 * rad_per_tick);
        self.last_ticks = positions;

        if dt <= 0.0 {
            return (0.0, 0.0, 0.0);
        }

        let rates = displacements.map(|angle| angle / dt);
        body_velocity(
            rates,
            self.geometry.wheel_radius,
            self.geometry.wheel_distance_from_center,
        )
    }

    fn driven_distance(&self) -> (f32, f32) {
        (self.driven_distance_forward(), self.driven_distance_strafe())
    }

    fn stop(&mut self) {
        self.front_right_motor.stop();
        self.front_left_motor.stop();
        self.rear_left_motor.stop();
        self.rear_right_motor.stop();
    }
}

/// Strafe with the strafe component of a speed function; forward and
/// angular intents are discarded.
pub fn strafe<'a>(
    device: &'a mut OmniWheeledDevice,
    condition: ConditionalFunction<'a>,
    mut speed_fn: SpeedFunction<'a>,
) -> SpeedWhile<'a, OmniWheeled> {
    device.set_speed_while(
        condition,
        Box::new(move |result| Speed::new(0.0, speed_fn(result).strafe, 0.0)),
    )
}

/// Strafe at a constant normalized speed.
pub fn strafe_at_speed<'a>(
    device: &'a mut OmniWheeledDevice,
    condition: ConditionalFunction<'a>,
    speed: Speed,
) -> SpeedWhile<'a, OmniWheeled> {
    device.set_speed_while(condition, constant(Speed::new(0.0, speed.strafe, 0.0)))
}

/// Translate along a fixed bearing without rotating. Zero degrees is
/// robot-forward, positive angles swing to the right.
pub fn strafe_at_angle<'a>(
    device: &'a mut OmniWheeledDevice,
    condition: ConditionalFunction<'a>,
    angle_deg: f32,
    speed_pct: f32,
) -> SpeedWhile<'a, OmniWheeled> {
    let angle = angle_deg.to_radians();
    let forward = speed_pct * angle.cos();
    let sideways = speed_pct * angle.sin();
    device.set_speed_while(condition, constant(Speed::new(forward, sideways, 0.0)))
}

/// Translate along a bearing supplied fresh every tick.
pub fn strafe_along<'a>(
    device: &'a mut OmniWheeledDevice,
    condition: ConditionalFunction<'a>,
    mut angle_deg_fn: impl FnMut() -> f32 + 'a,
    speed_pct: f32,
) -> SpeedWhile<'a, OmniWheeled> {
    device.set_speed_while(
        condition,
        Box::new(move |_| {
            let angle = angle_deg_fn().to_radians();
            Speed::new(speed_pct * angle.cos(), speed_pct * angle.sin(), 0.0)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use strider_core::hal::sim::SimBus;

    fn chassis(sim: &Arc<SimBus>) -> OmniWheeled {
        OmniWheeled::new(
            Motor::new(sim.clone(), 0, false),
            Motor::new(sim.clone(), 1, false),
            Motor::new(sim.clone(), 2, false),
            Motor::new(sim.clone(), 3, false),
        )
    }

    #[test]
    fn test_max_speeds_match_geometry() {
        let sim = Arc::new(SimBus::new());
        let chassis = chassis(&sim);
        let (vx_max, vy_max, omega_max) = chassis.max_speeds();

        let omega_wheel_max = 1500.0 / 1582.0 * TAU;
        assert_relative_eq!(vx_max, omega_wheel_max * 0.035, epsilon = 1e-5);
        assert_relative_eq!(vy_max, vx_max);
        assert_relative_eq!(omega_max, vx_max / 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_pure_strafe_wheel_pattern() {
        let geometry = OmniWheeledGeometry::default();
        let (_, vy_max, _) = {
            let omega_wheel_max = 1500.0 / geometry.ticks_per_revolution * TAU;
            let linear = omega_wheel_max * geometry.wheel_radius;
            (linear, linear, linear / geometry.wheel_distance_from_center)
        };

        let wheels = wheel_speeds_rad(
            &AbsoluteSpeed::new(0.0, vy_max, 0.0),
            geometry.wheel_radius,
            geometry.wheel_distance_from_center,
        );
        let unit = vy_max / geometry.wheel_radius;
        assert_relative_eq!(wheels[0], unit, epsilon = 1e-4);
        assert_relative_eq!(wheels[1], -unit, epsilon = 1e-4);
        assert_relative_eq!(wheels[2], unit, epsilon = 1e-4);
        assert_relative_eq!(wheels[3], -unit, epsilon = 1e-4);
    }

    #[test]
    fn test_kinematic_round_trip() {
        let geometry = OmniWheeledGeometry::default();
        let commands = [
            AbsoluteSpeed::new(0.2, 0.0, 0.0),
            AbsoluteSpeed::new(0.0, 0.15, 0.0),
            AbsoluteSpeed::new(0.0, 0.0, 1.5),
            AbsoluteSpeed::new(0.1, -0.05, 0.8),
        ];
        for command in commands {
            let wheels = wheel_speeds_rad(
                &command,
                geometry.wheel_radius,
                geometry.wheel_distance_from_center,
            );
            let (vx, vy, omega) = body_velocity(
                wheels,
                geometry.wheel_radius,
                geometry.wheel_distance_from_center,
            );
            assert_relative_eq!(vx, command.forward_ms, epsilon = 1e-5);
            assert_relative_eq!(vy, command.strafe_ms, epsilon = 1e-5);
            assert_relative_eq!(omega, command.angular_rad, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_driven_distance_components() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);
        chassis.begin_motion();

        // One revolution on every wheel: pure forward travel.
        for port in 0..4 {
            sim.set_motor_position(port, 1582);
        }
        let (forward, strafe) = chassis.driven_distance();
        assert_relative_eq!(forward, TAU * 0.035, epsilon = 1e-4);
        assert_relative_eq!(strafe, 0.0, epsilon = 1e-6);

        // Strafe pattern (+,−,+,−): pure sideways travel.
        sim.set_motor_position(0, 1582);
        sim.set_motor_position(1, -1582);
        sim.set_motor_position(2, 1582);
        sim.set_motor_position(3, -1582);
        let (forward, strafe) = chassis.driven_distance();
        assert_relative_eq!(forward, 0.0, epsilon = 1e-6);
        assert_relative_eq!(strafe, TAU * 0.035, epsilon = 1e-4);
    }

    #[test]
    fn test_speed_by_wheel_sides() {
        let sim = Arc::new(SimBus::new());
        let chassis = chassis(&sim);

        let same = chassis.speed_by_wheel_sides(10.0, 10.0);
        assert_relative_eq!(same.forward_ms, 10.0 * 0.035, epsilon = 1e-6);
        assert_relative_eq!(same.angular_rad, 0.0);

        let spin = chassis.speed_by_wheel_sides(-10.0, 10.0);
        assert_relative_eq!(spin.forward_ms, 0.0);
        assert_relative_eq!(spin.angular_rad, 10.0 * 0.035 / 0.1, epsilon = 1e-5);
    }
}
