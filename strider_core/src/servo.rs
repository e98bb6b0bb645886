//! Minimal servo surface: position with range checking, enable/disable.

use crate::error::{StriderError, StriderResult};
use crate::hal::{BusHandle, ServoBus};

pub const SERVO_MIN_POSITION: i32 = 0;
pub const SERVO_MAX_POSITION: i32 = 2047;

/// One servo on a bus port.
#[derive(Clone)]
pub struct Servo {
    bus: BusHandle,
    port: u8,
}

impl Servo {
    pub fn new(bus: BusHandle, port: u8) -> Self {
        Self { bus, port }
    }

    /// Command an absolute position; out-of-range values are rejected.
    pub fn set_position(&self, position: i32) -> StriderResult<()> {
        if !(SERVO_MIN_POSITION..=SERVO_MAX_POSITION).contains(&position) {
            return Err(StriderError::ServoPositionOutOfRange {
                position,
                max: SERVO_MAX_POSITION,
            });
        }
        self.bus.set_servo_position(self.port, position as u16);
        Ok(())
    }

    pub fn enable(&self) {
        self.bus.enable_servo(self.port);
    }

    pub fn disable(&self) {
        self.bus.disable_servo(self.port);
    }
}

/// Disable every servo on the bus.
pub fn disable_all_servos(bus: &BusHandle) {
    bus.disable_servos();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimBus;
    use std::sync::Arc;

    #[test]
    fn test_position_in_range_is_written() {
        let sim = Arc::new(SimBus::new());
        let servo = Servo::new(sim.clone(), 0);
        servo.set_position(1500).unwrap();
        assert_eq!(sim.servo_position(0), 1500);
    }

    #[test]
    fn test_out_of_range_position_rejected() {
        let sim = Arc::new(SimBus::new());
        let servo = Servo::new(sim.clone(), 0);
        servo.set_position(900).unwrap();
        assert!(servo.set_position(2048).is_err());
        assert!(servo.set_position(-1).is_err());
        // The last good position stays in place.
        assert_eq!(sim.servo_position(0), 900);
    }

    #[test]
    fn test_enable_disable_roundtrip() {
        let sim = Arc::new(SimBus::new());
        let servo = Servo::new(sim.clone(), 2);
        servo.enable();
        assert!(sim.servo_enabled(2));
        servo.disable();
        assert!(!sim.servo_enabled(2));
    }
}
