//! # STRIDER Core
//!
//! The motion-control core for the STRIDER mobile-robot library.
//!
//! STRIDER drives wheeled robots (two-wheeled differential and four-wheeled
//! omni) by translating motion intents — "drive straight 30 cm", "rotate 90°",
//! "follow a line" — into per-wheel velocity commands that close the loop on
//! wheel encoders and an IMU. This crate provides the building blocks:
//!
//! - **Datatypes**: normalized speeds, loop conditionals, speed functions
//! - **Attitude**: quaternion EKF fusing gyro, accelerometer and magnetometer
//! - **Motion**: the `set_speed_while` engine, PID bank and motion primitives
//! - **Devices**: the [`Chassis`](device::Chassis) seam concrete drive bases
//!   plug into
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strider_core::datatype::{constant, for_distance, Speed};
//! use strider_core::device::{Chassis, Device};
//!
//! fn forward_30cm(device: &mut Device<impl Chassis>) {
//!     device
//!         .set_speed_while(for_distance(30.0), constant(Speed::MEDIUM))
//!         .run();
//! }
//! ```

pub mod ahrs;
pub mod datatype;
pub mod device;
pub mod error;
pub mod hal;
pub mod math;
pub mod motion;
pub mod motor;
pub mod sensor;
pub mod servo;
pub mod thread;
pub mod utility;

// Re-export commonly used types for easy access
pub use datatype::{AbsoluteSpeed, Axis, ConditionalResult, Direction, Speed};
pub use device::{Chassis, Device};
pub use error::{StriderError, StriderResult};
pub use hal::Peripherals;
pub use motion::{MotionOptions, SpeedWhile};
pub use motor::Motor;
