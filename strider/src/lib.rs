//! # STRIDER
//!
//! Motion control for small wheeled robots: a conditional execution engine,
//! differential and omni kinematics, a multi-axis PID bank, and
//! IMU-based attitude fusion to keep headings honest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use strider::prelude::*;
//! use strider::hal::sim::SimBus;
//!
//! let bus: BusHandle = Arc::new(SimBus::new());
//! let chassis = TwoWheeled::new(
//!     Motor::new(bus.clone(), 0, false),
//!     Motor::new(bus.clone(), 1, true),
//! );
//! let mut robot = Device::new(bus, chassis, Axis::Z, Direction::Forward);
//! robot.set_heading_pid(2.0, 0.0, 0.05);
//!
//! // Drive 30 cm, holding the heading.
//! drive_straight(&mut robot, for_distance(30.0), constant(Speed::MEDIUM)).run();
//!
//! // Quarter turn clockwise.
//! rotate(&mut robot, for_cw_rotation(90.0), constant(Speed::SLOW)).run();
//! robot.shutdown();
//! ```

// Re-export core components
pub use strider_core::{self, *};

// Re-export the device library with an alias
pub use strider_devices as devices;

// Re-export commonly used dependencies at the crate root
pub use log;
pub use nalgebra;
pub use serde;

/// The STRIDER prelude - everything you need to drive a robot
pub mod prelude {
    // Device surface
    pub use strider_core::device::{Chassis, Device};
    pub use strider_core::hal::{BusHandle, Peripherals};
    pub use strider_core::motor::Motor;
    pub use strider_core::sensor::{Imu, LightSensor};

    // Datatypes and the conditional/speed constructors
    pub use strider_core::datatype::{
        constant, for_ccw_rotation, for_cw_rotation, for_distance, for_seconds, for_ticks,
        for_time, generator, lerp, while_false, while_true, AbsoluteSpeed, Axis,
        ConditionalResult, Direction, Speed,
    };

    // Motion engine and primitives
    pub use strider_core::motion::{
        backward_line_up, drive_straight, follow_line, forward_line_up, rotate, MotionOptions,
        SpeedWhile,
    };

    // Error types
    pub use strider_core::error::{StriderError, StriderResult};
    pub type Result<T> = StriderResult<T>;

    // Concrete drive bases
    pub use strider_devices::omni_wheeled::{self, OmniWheeled, OmniWheeledDevice};
    pub use strider_devices::two_wheeled::{TwoWheeled, TwoWheeledDevice};

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::{Duration, Instant};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get STRIDER version
pub fn version() -> &'static str {
    VERSION
}
