//! # STRIDER Devices
//!
//! Concrete drive bases for the STRIDER motion core:
//!
//! - [`TwoWheeled`]: classic two-wheel differential drive
//! - [`OmniWheeled`]: four mecanum-style wheels at ±45°, adding strafe
//!
//! Both implement [`Chassis`](strider_core::device::Chassis) and plug into
//! [`Device`](strider_core::device::Device); the omni module adds the
//! strafe primitives and sideways distance conditionals a holonomic base
//! makes possible.

pub mod omni_wheeled;
pub mod two_wheeled;

pub use omni_wheeled::{OmniWheeled, OmniWheeledDevice, OmniWheeledGeometry};
pub use two_wheeled::{TwoWheeled, TwoWheeledDevice, TwoWheeledGeometry};
