//! The motion-control pipeline: drive state, the multi-axis PID controller,
//! the `set_speed_while` engine and the motion primitives built on it.

mod controller;
mod engine;
mod primitives;
mod state;

pub use controller::DriveController;
pub use engine::{MotionOptions, SpeedWhile};
pub use primitives::{
    backward_line_up, drive_straight, follow_line, forward_line_up, rotate,
};
pub use state::DriveState;
