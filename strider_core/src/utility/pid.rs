use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Proportional/integral/derivative gains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

/// Single-axis PID controller.
///
/// Integrates error over measured wall time and differentiates by
/// error-delta over the same interval (steady clock). Assigning new gains
/// resets the accumulated state.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral: f64,
    previous_error: Option<f32>,
    last_time: Instant,
}

impl Default for PidController {
    fn default() -> Self {
        Self::new(PidGains::default())
    }
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            previous_error: None,
            last_time: Instant::now(),
        }
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        self.reset();
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Clear integral, previous error and the time base.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
        self.last_time = Instant::now();
    }

    /// One controller step for the given error.
    pub fn calculate(&mut self, error: f32) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last_time).as_secs_f64();
        self.last_time = now;

        let mut derivative = 0.0;
        if dt > 0.0 {
            self.integral += f64::from(error) * dt;
            if let Some(previous) = self.previous_error {
                derivative = f64::from(error - previous) / dt;
            }
        }
        self.previous_error = Some(error);

        error * self.gains.kp
            + (self.gains.ki as f64 * self.integral) as f32
            + (self.gains.kd as f64 * derivative) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_proportional_only() {
        let mut pid = PidController::new(PidGains::new(2.0, 0.0, 0.0));
        assert_relative_eq!(pid.calculate(0.5), 1.0);
        assert_relative_eq!(pid.calculate(-0.25), -0.5);
    }

    #[test]
    fn test_integral_accumulates() {
        let mut pid = PidController::new(PidGains::new(0.0, 1.0, 0.0));
        pid.calculate(1.0);
        sleep(Duration::from_millis(40));
        let out = pid.calculate(1.0);
        // Roughly the elapsed time in seconds.
        assert!(out > 0.02 && out < 0.5, "integral term = {out}");
    }

    #[test]
    fn test_reset_clears_state() {
        let mut pid = PidController::new(PidGains::new(0.0, 1.0, 1.0));
        pid.calculate(1.0);
        sleep(Duration::from_millis(20));
        pid.calculate(1.0);
        pid.reset();
        sleep(Duration::from_millis(5));
        let out = pid.calculate(0.0);
        assert_relative_eq!(out, 0.0);
    }

    #[test]
    fn test_set_gains_resets() {
        let mut pid = PidController::new(PidGains::new(0.0, 10.0, 0.0));
        pid.calculate(5.0);
        sleep(Duration::from_millis(20));
        pid.set_gains(PidGains::new(1.0, 0.0, 0.0));
        assert_relative_eq!(pid.calculate(0.5), 0.5);
    }
}
