//! The `set_speed_while` engine.
//!
//! [`SpeedWhile`] is the central control loop in explicit-state form: one
//! call to [`step`](SpeedWhile::step) is one control tick, and the point
//! between ticks is the cooperative suspension point — a host scheduler may
//! drive `step` itself, or hand the task to [`run`](SpeedWhile::run) which
//! paces it at the control rate.
//!
//! Tick order: evaluate the conditional, scale the requested speed to SI
//! units, measure wheel velocities over the elapsed time, fuse the gyro and
//! integrate heading, slew the ramped setpoints, run the PID bank, clamp,
//! and write the result through the inverse kinematics.

use std::thread::sleep;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::datatype::{AbsoluteSpeed, ConditionalFunction, SpeedFunction};
use crate::device::{Chassis, Device};
use crate::utility::CONTROL_LOOP_HZ;

/// Flags shaping a single `set_speed_while` invocation.
#[derive(Debug, Clone, Copy)]
pub struct MotionOptions {
    /// Use the gyro for heading integration and run the heading controller.
    /// Off, the engine runs encoder-only and tolerates a missing gyro.
    pub do_correction: bool,
    /// Stop the drive base when the loop exits.
    pub auto_stop: bool,
    /// Zero the ramped setpoints on entry.
    pub reset_ramps: bool,
}

impl Default for MotionOptions {
    fn default() -> Self {
        Self {
            do_correction: true,
            auto_stop: true,
            reset_ramps: true,
        }
    }
}

/// An in-flight motion: borrows the device until the conditional completes.
pub struct SpeedWhile<'a, C: Chassis> {
    device: &'a mut Device<C>,
    condition: ConditionalFunction<'a>,
    speed_fn: SpeedFunction<'a>,
    options: MotionOptions,
    last_tick: Instant,
    finished: bool,
}

impl<'a, C: Chassis> SpeedWhile<'a, C> {
    pub(crate) fn new(
        device: &'a mut Device<C>,
        condition: ConditionalFunction<'a>,
        speed_fn: SpeedFunction<'a>,
        options: MotionOptions,
    ) -> Self {
        device.chassis.begin_motion();
        let gains = device.pid_gains;
        device
            .controller
            .set_gains(gains.vx, gains.vy, gains.omega, gains.heading);
        device.state.retarget_heading();
        if options.reset_ramps {
            device.state.reset_ramps();
        }
        debug!(
            "motion started (correction: {}, auto_stop: {})",
            options.do_correction, options.auto_stop
        );

        Self {
            device,
            condition,
            speed_fn,
            options,
            last_tick: Instant::now(),
            finished: false,
        }
    }

    /// One control tick. Returns false once the conditional has completed
    /// (the device is stopped on the way out when `auto_stop` is set).
    pub fn step(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let device = &mut *self.device;

        let mut result = (self.condition)(false);
        let driven = device.chassis.driven_distance();
        result.update(&mut device.state, driven);
        trace!("conditional: {result}");
        if !result.is_loop_running() {
            debug!("condition met, exiting motion loop ({result})");
            self.finish();
            return false;
        }

        let desired = (self.speed_fn)(&result);
        let absolute = device.to_absolute_speed(desired, self.options.do_correction);

        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        let (vx_measured, vy_measured, omega_wheels) = device.chassis.wheel_velocities(dt);
        let omega_measured = if self.options.do_correction {
            device.attitude.gyro_reading(&device.imu)
        } else {
            omega_wheels
        };
        trace!(
            "measured velocities ({vx_measured:.4}, {vy_measured:.4}, {omega_measured:.4}), dt {dt:.4}"
        );

        if self.options.do_correction {
            device.state.current_heading += omega_measured * dt;
        }

        device.state.ramp_towards(&absolute, device.max_accel, dt);
        let ramped = device.state.ramped_speed();

        let (mut vx, mut vy, mut omega) = if self.options.do_correction {
            device.controller.calculate(
                &device.state,
                device.direction,
                &ramped,
                vx_measured,
                vy_measured,
                omega_measured,
            )
        } else {
            // Encoder-only mode: velocity PIDs still run, the angular axis
            // follows the ramped setpoint without heading correction.
            let (vx, vy, _) = device.controller.calculate(
                &device.state,
                device.direction,
                &ramped,
                vx_measured,
                vy_measured,
                0.0,
            );
            (vx, vy, ramped.angular_rad)
        };

        if let Some((max_vx, max_vy, max_omega)) = device.speed_limits {
            vx = vx.clamp(-max_vx, max_vx);
            vy = vy.clamp(-max_vy, max_vy);
            omega = omega.clamp(-max_omega, max_omega);
        }

        trace!("final command ({vx:.4}, {vy:.4}, {omega:.4})");
        device
            .chassis
            .apply_kinematics(&AbsoluteSpeed::new(vx, vy, omega));
        true
    }

    fn finish(&mut self) {
        if self.options.auto_stop {
            debug!("stopping device after motion loop");
            self.device.chassis.stop();
        }
        self.finished = true;
    }

    /// Drive the task to completion at the control-loop rate.
    pub fn run(mut self) {
        let period = Duration::from_micros(1_000_000 / u64::from(CONTROL_LOOP_HZ));
        while self.step() {
            if let Some(rest) = period.checked_sub(self.last_tick.elapsed()) {
                sleep(rest);
            }
        }
    }
}

impl<C: Chassis> Drop for SpeedWhile<'_, C> {
    /// Dropping an unfinished task writes the stop `auto_stop` would have
    /// written on normal exit.
    fn drop(&mut self) {
        if !self.finished && self.options.auto_stop {
            self.device.chassis.stop();
        }
    }
}
