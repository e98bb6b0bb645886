//! Core data model: normalized speeds, axes, loop conditionals and the
//! pluggable conditional/speed function types consumed by the motion engine.

mod axis;
mod conditions;
mod functions;
mod speed;

pub use axis::{Axis, Direction};
pub use conditions::{ConditionalResult, Progress};
pub use functions::{
    constant, for_distance, for_seconds, for_ticks, for_time, generator, lerp, while_false,
    while_true, ConditionalFunction, SpeedFunction,
};
pub use functions::{for_ccw_rotation, for_cw_rotation};
pub use speed::{AbsoluteSpeed, Speed};
