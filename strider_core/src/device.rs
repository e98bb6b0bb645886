//! The device abstraction: one drive base, its sensors, and the motion API.

use log::{debug, warn};

use crate::ahrs::AttitudeEstimator;
use crate::datatype::{
    AbsoluteSpeed, Axis, ConditionalFunction, Direction, Speed, SpeedFunction,
};
use crate::hal::{BusHandle, MotorBus, ServoBus};
use crate::motion::{DriveController, DriveState, MotionOptions, SpeedWhile};
use crate::sensor::Imu;
use crate::utility::PidGains;

/// Fraction of the theoretical maximum left available to the controller
/// when closed-loop correction is active.
const CORRECTION_HEADROOM: f32 = 0.95;

/// The capability set a concrete drive base provides to the motion engine.
///
/// Implementations are dispatched statically; the engine is generic over
/// the chassis rather than dynamic over a hierarchy.
pub trait Chassis {
    /// Latch encoder baselines; called once at the start of every motion.
    fn begin_motion(&mut self);

    /// Theoretical maxima as (forward m/s, strafe m/s, angular rad/s).
    /// A differential base reports zero strafe.
    fn max_speeds(&self) -> (f32, f32, f32);

    /// Write a body-frame command through the inverse kinematics to the
    /// wheel motors.
    fn apply_kinematics(&mut self, speed: &AbsoluteSpeed);

    /// Measured body velocities from encoder deltas over `dt` seconds,
    /// as (forward m/s, strafe m/s, angular rad/s).
    fn wheel_velocities(&mut self, dt: f32) -> (f32, f32, f32);

    /// Distance driven since `begin_motion`, robot frame, metres.
    fn driven_distance(&self) -> (f32, f32);

    /// Bring all wheels to an active stop.
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DevicePidGains {
    pub vx: PidGains,
    pub vy: PidGains,
    pub omega: PidGains,
    pub heading: PidGains,
}

/// One robot drive base with its IMU, attitude estimator, controller bank
/// and drive state.
///
/// Motors and the IMU are owned by exactly one device; running two motions
/// on the same device at once is a programming error and is prevented by
/// the mutable borrow [`set_speed_while`](Self::set_speed_while) takes.
pub struct Device<C: Chassis> {
    pub chassis: C,
    pub imu: Imu,
    pub(crate) attitude: AttitudeEstimator,
    pub(crate) controller: DriveController,
    pub(crate) state: DriveState,
    pub(crate) pid_gains: DevicePidGains,
    pub(crate) max_accel: (f32, f32, f32),
    pub(crate) speed_limits: Option<(f32, f32, f32)>,
    pub(crate) direction: Direction,
    bus: BusHandle,
    has_shutdown: bool,
}

impl<C: Chassis> Device<C> {
    /// Build a device around a chassis. `yaw_axis` selects the gyro axis
    /// used for heading; `direction` flips the heading convention for
    /// bases mounted backwards.
    pub fn new(bus: BusHandle, chassis: C, yaw_axis: Axis, direction: Direction) -> Self {
        Self {
            chassis,
            imu: Imu::new(bus.clone()),
            attitude: AttitudeEstimator::new(yaw_axis),
            controller: DriveController::default(),
            state: DriveState::default(),
            pid_gains: DevicePidGains::default(),
            max_accel: (0.5, 0.5, 1.0),
            speed_limits: None,
            direction,
            bus,
            has_shutdown: false,
        }
    }

    pub fn set_vx_pid(&mut self, kp: f32, ki: f32, kd: f32) {
        self.pid_gains.vx = PidGains::new(kp, ki, kd);
    }

    pub fn set_vy_pid(&mut self, kp: f32, ki: f32, kd: f32) {
        self.pid_gains.vy = PidGains::new(kp, ki, kd);
    }

    pub fn set_w_pid(&mut self, kp: f32, ki: f32, kd: f32) {
        self.pid_gains.omega = PidGains::new(kp, ki, kd);
    }

    pub fn set_heading_pid(&mut self, kp: f32, ki: f32, kd: f32) {
        self.pid_gains.heading = PidGains::new(kp, ki, kd);
    }

    /// Per-axis acceleration limits in m/s² (forward, strafe) and rad/s²
    /// (angular).
    pub fn set_max_accel(&mut self, forward: f32, strafe: f32, angular: f32) {
        self.max_accel = (forward, strafe, angular);
    }

    /// Cap the final commands in m/s and rad/s. Unset, the only bound is
    /// the chassis' own maximum.
    pub fn set_max_speeds(&mut self, forward: f32, strafe: f32, angular: f32) {
        self.speed_limits = Some((forward, strafe, angular));
    }

    /// Zero the heading frame, keeping the ramped setpoints so an ongoing
    /// movement is not jerked.
    pub fn reset_state(&mut self) {
        self.state.current_heading = 0.0;
        self.state.desired_heading = 0.0;
    }

    /// Heading accumulated during the current/last motion, radians,
    /// positive clockwise.
    pub fn current_heading(&self) -> f32 {
        self.state.current_heading
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Start the background attitude estimator. The robot must be
    /// stationary while it calibrates.
    pub fn start_attitude_estimation(&mut self) {
        let imu = self.imu.clone();
        self.attitude.start_estimation(&imu);
    }

    pub fn stop_attitude_estimation(&mut self) {
        self.attitude.stop_estimation();
    }

    pub fn attitude(&self) -> &AttitudeEstimator {
        &self.attitude
    }

    /// Scale a normalized speed by the chassis maxima. With `throttle` set
    /// a correction headroom is kept so the PID bank has authority left at
    /// full stick.
    pub fn to_absolute_speed(&self, speed: Speed, throttle: bool) -> AbsoluteSpeed {
        let (mut max_forward, mut max_strafe, mut max_angular) = self.chassis.max_speeds();
        if throttle {
            max_forward *= CORRECTION_HEADROOM;
            max_strafe *= CORRECTION_HEADROOM;
            max_angular *= CORRECTION_HEADROOM;
        }
        AbsoluteSpeed::new(
            speed.forward * max_forward,
            speed.strafe * max_strafe,
            speed.angular * max_angular,
        )
    }

    /// Drive until the conditional completes, velocities supplied by
    /// `speed_fn` each tick. Returns the motion task; call
    /// [`run`](SpeedWhile::run) or step it from a scheduler.
    pub fn set_speed_while<'a>(
        &'a mut self,
        condition: ConditionalFunction<'a>,
        speed_fn: SpeedFunction<'a>,
    ) -> SpeedWhile<'a, C> {
        self.set_speed_while_with(condition, speed_fn, MotionOptions::default())
    }

    /// [`set_speed_while`](Self::set_speed_while) with explicit options.
    pub fn set_speed_while_with<'a>(
        &'a mut self,
        condition: ConditionalFunction<'a>,
        speed_fn: SpeedFunction<'a>,
        options: MotionOptions,
    ) -> SpeedWhile<'a, C> {
        SpeedWhile::new(self, condition, speed_fn, options)
    }

    /// Arc of the given radius at a forward fraction of the maximum speed.
    /// `direction` drives the same arc in reverse when `Backward`.
    pub fn drive_arc<'a>(
        &'a mut self,
        condition: ConditionalFunction<'a>,
        radius_cm: f32,
        forward_pct: f32,
        direction: Direction,
    ) -> SpeedWhile<'a, C> {
        let (max_forward, _, max_angular) = self.chassis.max_speeds();
        if radius_cm <= 0.0 {
            warn!("drive_arc with radius {radius_cm} cm, angular speed will saturate");
        }
        let radius = radius_cm / 100.0;
        let max_linear = max_forward * forward_pct;
        let sign = direction.sign();

        self.set_speed_while(
            condition,
            Box::new(move |_| {
                let omega = max_linear / radius;
                let angular_pct = (omega / max_angular).clamp(-1.0, 1.0);
                let forward_pct = forward_pct.clamp(-1.0, 1.0);
                Speed::new(sign * forward_pct, 0.0, sign * angular_pct)
            }),
        )
    }

    /// Stop everything this device owns. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.has_shutdown {
            return;
        }
        self.has_shutdown = true;
        debug!("device shutting down");
        self.attitude.stop_estimation();
        self.bus.disable_servos();
        self.bus.all_off();
    }
}

impl<C: Chassis> Drop for Device<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
