//! Two-wheel differential drive.

mod calibration;

pub use calibration::{calibrate_ticks_per_revolution, calibrate_wheel_base};

use std::f32::consts::TAU;

use log::trace;
use serde::{Deserialize, Serialize};

use strider_core::datatype::AbsoluteSpeed;
use strider_core::device::{Chassis, Device};
use strider_core::motor::Motor;
use strider_core::utility::MAX_MOTOR_SPEED;

/// A [`Device`] on a differential base.
pub type TwoWheeledDevice = Device<TwoWheeled>;

/// Measured geometry of a differential base. The defaults match the stock
/// build; run the calibration routines for anything custom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoWheeledGeometry {
    pub ticks_per_revolution: f32,
    /// Lateral distance between the two driven wheels, metres.
    pub wheel_base: f32,
    /// Wheel radius, metres.
    pub wheel_radius: f32,
}

impl Default for TwoWheeledGeometry {
    fn default() -> Self {
        Self {
            ticks_per_revolution: 1582.0,
            wheel_base: 0.1796,
            wheel_radius: 0.035,
        }
    }
}

/// Per-wheel linear speeds for a body command: `v ∓ ω·L/2`.
fn wheel_speeds_ms(speed: &AbsoluteSpeed, wheel_base: f32) -> (f32, f32) {
    let left = speed.forward_ms - speed.angular_rad * wheel_base / 2.0;
    let right = speed.forward_ms + speed.angular_rad * wheel_base / 2.0;
    (left, right)
}

/// Body velocity recovered from per-wheel linear speeds.
fn body_velocity(left_ms: f32, right_ms: f32, wheel_base: f32) -> (f32, f32) {
    ((left_ms + right_ms) / 2.0, (right_ms - left_ms) / wheel_base)
}

fn ms_to_ticks(speed_ms: f32, geometry: &TwoWheeledGeometry) -> f32 {
    speed_ms / (TAU * geometry.wheel_radius) * geometry.ticks_per_revolution
}

fn ticks_to_distance(ticks: f32, geometry: &TwoWheeledGeometry) -> f32 {
    ticks / geometry.ticks_per_revolution * TAU * geometry.wheel_radius
}

/// Two-wheel differential chassis.
pub struct TwoWheeled {
    pub left_motor: Motor,
    pub right_motor: Motor,
    pub geometry: TwoWheeledGeometry,
    last_left_ticks: i32,
    initial_left_ticks: i32,
    last_right_ticks: i32,
    initial_right_ticks: i32,
}

impl TwoWheeled {
    pub fn new(left_motor: Motor, right_motor: Motor) -> Self {
        Self::with_geometry(left_motor, right_motor, TwoWheeledGeometry::default())
    }

    pub fn with_geometry(
        left_motor: Motor,
        right_motor: Motor,
        geometry: TwoWheeledGeometry,
    ) -> Self {
        Self {
            left_motor,
            right_motor,
            geometry,
            last_left_ticks: 0,
            initial_left_ticks: 0,
            last_right_ticks: 0,
            initial_right_ticks: 0,
        }
    }
}

impl Chassis for TwoWheeled {
    fn begin_motion(&mut self) {
        self.last_left_ticks = self.left_motor.position();
        self.initial_left_ticks = self.last_left_ticks;
        self.last_right_ticks = self.right_motor.position();
        self.initial_right_ticks = self.last_right_ticks;
    }

    fn max_speeds(&self) -> (f32, f32, f32) {
        let v_wheel_max = TAU * self.geometry.wheel_radius * MAX_MOTOR_SPEED as f32
            / self.geometry.ticks_per_revolution;
        let omega_max = 2.0 * v_wheel_max / self.geometry.wheel_base;
        // No strafing on a differential base.
        (v_wheel_max, 0.0, omega_max)
    }

    fn apply_kinematics(&mut self, speed: &AbsoluteSpeed) {
        let (left_ms, right_ms) = wheel_speeds_ms(speed, self.geometry.wheel_base);
        trace!("wheel speeds {left_ms:.4} / {right_ms:.4} m/s");

        self.left_motor
            .set_velocity(ms_to_ticks(left_ms, &self.geometry) as i32);
        self.right_motor
            .set_velocity(ms_to_ticks(right_ms, &self.geometry) as i32);
    }

    fn wheel_velocities(&mut self, dt: f32) -> (f32, f32, f32) {
        let current_left = self.left_motor.position();
        let delta_left = current_left - self.last_left_ticks;
        self.last_left_ticks = current_left;

        let current_right = self.right_motor.position();
        let delta_right = current_right - self.last_right_ticks;
        self.last_right_ticks = current_right;

        if dt <= 0.0 {
            return (0.0, 0.0, 0.0);
        }

        let left_ms = ticks_to_distance(delta_left as f32, &self.geometry) / dt;
        let right_ms = ticks_to_distance(delta_right as f32, &self.geometry) / dt;
        let (forward, omega) = body_velocity(left_ms, right_ms, self.geometry.wheel_base);
        trace!("measured wheels {left_ms:.4} / {right_ms:.4} m/s -> ({forward:.4}, {omega:.4})");
        (forward, 0.0, omega)
    }

    fn driven_distance(&self) -> (f32, f32) {
        let delta_left = (self.left_motor.position() - self.initial_left_ticks) as f32;
        let delta_right = (self.right_motor.position() - self.initial_right_ticks) as f32;

        let left = ticks_to_distance(delta_left, &self.geometry);
        let right = ticks_to_distance(delta_right, &self.geometry);
        ((left + right) / 2.0, 0.0)
    }

    fn stop(&mut self) {
        self.left_motor.stop();
        self.right_motor.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use strider_core::datatype::{Axis, Direction, Speed};
    use strider_core::hal::sim::SimBus;

    fn chassis(sim: &Arc<SimBus>) -> TwoWheeled {
        TwoWheeled::new(
            Motor::new(sim.clone(), 0, false),
            Motor::new(sim.clone(), 1, false),
        )
    }

    #[test]
    fn test_max_speeds_match_geometry() {
        let sim = Arc::new(SimBus::new());
        let chassis = chassis(&sim);
        let (v_max, strafe_max, omega_max) = chassis.max_speeds();

        // 2π · 0.035 · 1500 / 1582
        assert_relative_eq!(v_max, 0.2085, epsilon = 1e-3);
        assert_eq!(strafe_max, 0.0);
        assert_relative_eq!(omega_max, 2.0 * v_max / 0.1796, epsilon = 1e-4);
    }

    #[test]
    fn test_half_forward_commands_equal_wheels() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);
        let device_speed = Speed::new(0.5, 0.0, 0.0);

        // Scale by the unthrottled maximum, then apply.
        let (v_max, _, _) = chassis.max_speeds();
        let absolute = AbsoluteSpeed::new(device_speed.forward * v_max, 0.0, 0.0);
        assert_relative_eq!(absolute.forward_ms, 0.104, epsilon = 1e-3);

        chassis.apply_kinematics(&absolute);
        assert_relative_eq!(sim.commanded_velocity(0) as f32, 750.0, epsilon = 1.0);
        assert_relative_eq!(sim.commanded_velocity(1) as f32, 750.0, epsilon = 1.0);
    }

    #[test]
    fn test_kinematic_round_trip() {
        let geometry = TwoWheeledGeometry::default();
        let commands = [
            AbsoluteSpeed::new(0.15, 0.0, 0.0),
            AbsoluteSpeed::new(0.0, 0.0, 1.2),
            AbsoluteSpeed::new(-0.1, 0.0, -0.7),
        ];
        for command in commands {
            let (left, right) = wheel_speeds_ms(&command, geometry.wheel_base);
            let (forward, omega) = body_velocity(left, right, geometry.wheel_base);
            assert_relative_eq!(forward, command.forward_ms, epsilon = 1e-6);
            assert_relative_eq!(omega, command.angular_rad, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_driven_distance_from_encoders() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);
        chassis.begin_motion();

        // One full revolution on both wheels = one circumference forward.
        sim.set_motor_position(0, 1582);
        sim.set_motor_position(1, 1582);
        let (forward, strafe) = chassis.driven_distance();
        assert_relative_eq!(forward, TAU * 0.035, epsilon = 1e-4);
        assert_eq!(strafe, 0.0);
    }

    #[test]
    fn test_device_to_absolute_speed_scales_and_throttles() {
        let sim = Arc::new(SimBus::new());
        let device = Device::new(
            sim.clone(),
            chassis(&sim),
            Axis::Z,
            Direction::Forward,
        );
        let (v_max, _, omega_max) = device.chassis.max_speeds();

        let full = device.to_absolute_speed(Speed::new(1.0, 0.0, 0.0), false);
        assert_relative_eq!(full.forward_ms, v_max, epsilon = 1e-6);
        assert_eq!(full.strafe_ms, 0.0);
        assert_eq!(full.angular_rad, 0.0);

        let throttled = device.to_absolute_speed(Speed::new(1.0, 0.0, 1.0), true);
        assert_relative_eq!(throttled.forward_ms, v_max * 0.95, epsilon = 1e-6);
        assert_relative_eq!(throttled.angular_rad, omega_max * 0.95, epsilon = 1e-6);

        for speed in [Speed::MEDIUM, Speed::FAST, Speed::FASTEST] {
            let absolute = device.to_absolute_speed(speed, false);
            assert!(absolute.forward_ms.abs() <= v_max + 1e-6);
            assert!(absolute.angular_rad.abs() <= omega_max + 1e-6);
        }
    }
}
