//! Cross-cutting utilities: PID control, log throttling, shared constants.

mod pid;
mod timing;

pub use pid::{PidController, PidGains};
pub use timing::LogThrottle;

/// Motion-control tick rate driven by [`SpeedWhile::run`](crate::motion::SpeedWhile::run).
pub const CONTROL_LOOP_HZ: u32 = 50;

/// Attitude-estimation tick rate.
pub const ESTIMATION_HZ: u32 = 100;

/// Hard bound of the motor controller, ticks per second.
pub const MAX_MOTOR_SPEED: i32 = 1500;

/// Above this the encoder tick estimation degrades; commands past it are
/// allowed but warned about.
pub const MAX_ACCURATE_MOTOR_SPEED: i32 = 1000;

/// Threshold under which a speed or heading target counts as zero.
pub const EPSILON: f32 = 0.01;
