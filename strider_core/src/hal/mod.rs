//! Peripheral bus traits.
//!
//! The motion core never talks to firmware directly; it goes through the
//! narrow traits below so the same pipeline runs against the robot
//! controller, a remote bridge, or the [`sim`] backend in tests.
//!
//! Conventions at this boundary:
//! - motor velocities are signed encoder ticks per second
//! - analog reads are raw 12-bit values in `0..=4095`
//! - IMU axes are NED (x forward, y right, z down); accel in m/s²,
//!   gyro in deg/s, magnetometer in µT

use std::sync::Arc;

use nalgebra::Vector3;

pub mod sim;

/// Motor side of the peripheral bus.
pub trait MotorBus {
    /// Command a signed velocity in encoder ticks per second.
    fn set_motor_velocity(&self, port: u8, ticks_per_s: i32);

    /// Issue an absolute position goal at the given speed.
    fn move_to_position(&self, port: u8, velocity: i32, target_ticks: i32);

    /// Signed position counter in encoder ticks.
    fn motor_position(&self, port: u8) -> i32;

    /// Zero the position counter.
    fn clear_motor_position(&self, port: u8);

    /// Whether the last position goal has been reached.
    fn motor_done(&self, port: u8) -> bool;

    /// Active-brake the motor in place.
    fn freeze(&self, port: u8);

    /// Cut power to every motor.
    fn all_off(&self);
}

/// Servo side of the peripheral bus.
pub trait ServoBus {
    fn set_servo_position(&self, port: u8, position: u16);
    fn enable_servo(&self, port: u8);
    fn disable_servo(&self, port: u8);
    fn disable_servos(&self);
}

/// Front-panel and ground-facing sensors.
pub trait SensorBus {
    /// Raw analog read in `0..=4095`.
    fn analog(&self, port: u8) -> i32;

    fn digital(&self, port: u8) -> bool;

    /// True while any front-panel button is held.
    fn any_button(&self) -> bool;
}

/// Tri-axis inertial sensors.
pub trait ImuBus {
    /// Acceleration in m/s², NED.
    fn accel(&self) -> Vector3<f64>;

    /// Angular rate in deg/s, NED.
    fn gyro(&self) -> Vector3<f64>;

    /// Raw magnetic field in µT.
    fn magneto(&self) -> Vector3<f64>;
}

/// The full peripheral surface the core needs. Blanket-implemented for any
/// type providing the four bus traits; components share it as
/// `Arc<dyn Peripherals>`.
pub trait Peripherals: MotorBus + ServoBus + SensorBus + ImuBus + Send + Sync {}

impl<T: MotorBus + ServoBus + SensorBus + ImuBus + Send + Sync> Peripherals for T {}

/// Shared handle to a peripheral bus.
pub type BusHandle = Arc<dyn Peripherals>;
