//! Motor primitives: the velocity/position bridge between the motion engine
//! and the actuator bus.

use std::thread::sleep;
use std::time::Duration;

use log::{error, info, warn};

use crate::datatype::{ConditionalFunction, ConditionalResult};
use crate::hal::{BusHandle, MotorBus};
use crate::utility::{LogThrottle, MAX_ACCURATE_MOTOR_SPEED, MAX_MOTOR_SPEED};

/// Interval between polls of the actuator done flag.
const POLL_PERIOD: Duration = Duration::from_millis(10);

/// Fallback speed when a position move is requested with zero velocity.
const DEFAULT_POSITION_VELOCITY: i32 = 500;

/// One drive motor on a bus port.
///
/// `reversed` flips both the commanded sign and the reported position so a
/// mirrored mounting behaves like its twin.
pub struct Motor {
    bus: BusHandle,
    port: u8,
    polarity: i32,
    bounds_warning: LogThrottle,
    safety_warning: LogThrottle,
}

impl Motor {
    pub fn new(bus: BusHandle, port: u8, reversed: bool) -> Self {
        Self {
            bus,
            port,
            polarity: if reversed { -1 } else { 1 },
            bounds_warning: LogThrottle::per_second(),
            safety_warning: LogThrottle::per_second(),
        }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    /// Signed position estimate in encoder ticks.
    pub fn position(&self) -> i32 {
        self.bus.motor_position(self.port) * self.polarity
    }

    pub fn reset_position(&self) {
        self.bus.clear_motor_position(self.port);
    }

    /// Command a velocity in ticks/s.
    ///
    /// Values beyond the hard bound are clamped; values beyond the accurate
    /// range are let through with a rate-limited warning, since they degrade
    /// the encoder-based speed estimate.
    pub fn set_velocity(&mut self, ticks_per_s: i32) {
        let clamped = self.checked_velocity(ticks_per_s);
        self.bus
            .set_motor_velocity(self.port, self.polarity * clamped);
    }

    fn checked_velocity(&mut self, mut velocity: i32) -> i32 {
        if !(-MAX_MOTOR_SPEED..=MAX_MOTOR_SPEED).contains(&velocity) {
            if self.bounds_warning.ready() {
                error!(
                    "[motor {}] velocity {} out of bounds, clamping to ±{}",
                    self.port, velocity, MAX_MOTOR_SPEED
                );
            }
            velocity = velocity.clamp(-MAX_MOTOR_SPEED, MAX_MOTOR_SPEED);
        }
        if !(-MAX_ACCURATE_MOTOR_SPEED..=MAX_ACCURATE_MOTOR_SPEED).contains(&velocity)
            && self.safety_warning.ready()
        {
            warn!(
                "[motor {}] velocity {} beyond the accurate range, tick estimation may degrade",
                self.port, velocity
            );
        }
        velocity
    }

    /// Drive at `velocity` until the conditional completes.
    ///
    /// A motor-ticks conditional bypasses the velocity loop entirely and is
    /// executed as a relative position move.
    pub fn move_while(&mut self, mut condition: ConditionalFunction<'_>, velocity: i32) {
        if let ConditionalResult::MotorTicks(progress) = condition(true) {
            info!(
                "[motor {}] tick goal of {} ticks",
                self.port, progress.target
            );
            self.move_by_ticks(progress.target as i32, velocity);
            return;
        }

        while condition(false).is_loop_running() {
            self.set_velocity(velocity);
            sleep(POLL_PERIOD);
        }
        self.stop();
    }

    /// Relative position move by `ticks`.
    pub fn move_by_ticks(&mut self, ticks: i32, velocity: i32) {
        let target = self.bus.motor_position(self.port) + self.polarity * ticks;
        self.move_to_ticks(target, velocity);
    }

    /// Absolute position move.
    ///
    /// The command is re-issued on every poll until the actuator reports
    /// done: the bus occasionally drops the first position goal, and
    /// re-sending is idempotent.
    pub fn move_to_ticks(&mut self, target: i32, velocity: i32) {
        let velocity = self.checked_position_velocity(velocity);

        self.bus.move_to_position(self.port, velocity, target);
        sleep(POLL_PERIOD);
        while !self.bus.motor_done(self.port) {
            self.bus.move_to_position(self.port, velocity, target);
            sleep(POLL_PERIOD);
        }
        self.stop();
    }

    fn checked_position_velocity(&mut self, mut velocity: i32) -> i32 {
        if velocity == 0 {
            error!(
                "[motor {}] position move with zero velocity, using {}",
                self.port, DEFAULT_POSITION_VELOCITY
            );
            velocity = DEFAULT_POSITION_VELOCITY;
        }
        if velocity < 0 {
            warn!(
                "[motor {}] negative velocity for a position move, magnitude is what counts",
                self.port
            );
        }
        self.checked_velocity(velocity)
    }

    /// Active-brake in place.
    pub fn stop(&mut self) {
        self.bus.freeze(self.port);
    }
}

/// Cut power to every motor on the bus.
pub fn stop_all_motors(bus: &BusHandle) {
    bus.all_off();
}
