//! Ground-facing and panel sensors: analog, digital, IR distance, and the
//! statistically calibrated light sensor used for line work.

use std::thread::sleep;
use std::time::Duration;

use log::{info, warn};

use crate::error::{StriderError, StriderResult};
use crate::hal::{BusHandle, SensorBus};

/// Raw 12-bit analog input.
#[derive(Clone)]
pub struct AnalogSensor {
    bus: BusHandle,
    port: u8,
}

impl AnalogSensor {
    pub fn new(bus: BusHandle, port: u8) -> Self {
        Self { bus, port }
    }

    pub fn value(&self) -> i32 {
        self.bus.analog(self.port)
    }

    pub fn port(&self) -> u8 {
        self.port
    }
}

/// Digital input treated as a push switch.
#[derive(Clone)]
pub struct DigitalSensor {
    bus: BusHandle,
    port: u8,
}

impl DigitalSensor {
    pub fn new(bus: BusHandle, port: u8) -> Self {
        Self { bus, port }
    }

    pub fn is_pressed(&self) -> bool {
        self.bus.digital(self.port)
    }
}

/// Sharp-style IR distance sensor on an analog port.
#[derive(Clone)]
pub struct DistanceSensor {
    inner: AnalogSensor,
}

impl DistanceSensor {
    pub fn new(bus: BusHandle, port: u8) -> Self {
        Self {
            inner: AnalogSensor::new(bus, port),
        }
    }

    /// Distance in centimetres from the sensor's voltage curve.
    pub fn distance_cm(&self) -> f64 {
        let volt = f64::from(self.inner.value()) / 1251.215;
        (38.6 - 7.0 * volt) / (0.2 + volt)
    }
}

/// Reflective light sensor with white/black classification.
///
/// Calibration estimates mean and spread of both surfaces; thresholds sit a
/// configurable fraction of the contrast away from each mean, and
/// [`probability_of_black`](Self::probability_of_black) exposes a soft
/// Gaussian classifier for probabilistic callers.
#[derive(Clone)]
pub struct LightSensor {
    inner: AnalogSensor,
    threshold_factor: f32,
    white_threshold: i32,
    black_threshold: i32,
    white_mean: f32,
    black_mean: f32,
    white_std_dev: f32,
    black_std_dev: f32,
}

/// Minimum white/black contrast for a usable calibration.
const MIN_CONTRAST: f32 = 100.0;

impl LightSensor {
    pub fn new(bus: BusHandle, port: u8) -> Self {
        Self::with_factor(bus, port, 1.0)
    }

    /// `factor` scales how far from the surface means the thresholds sit;
    /// 1.0 puts both at the midpoint of the contrast band.
    pub fn with_factor(bus: BusHandle, port: u8, factor: f32) -> Self {
        Self {
            inner: AnalogSensor::new(bus, port),
            threshold_factor: factor * 0.5,
            white_threshold: 0,
            black_threshold: 0,
            white_mean: 0.0,
            black_mean: 0.0,
            white_std_dev: 1.0,
            black_std_dev: 1.0,
        }
    }

    pub fn value(&self) -> i32 {
        self.inner.value()
    }

    pub fn port(&self) -> u8 {
        self.inner.port()
    }

    /// Fit thresholds from raw samples taken on a white and a black surface.
    ///
    /// White must read lower than black and the contrast must clear
    /// [`MIN_CONTRAST`]; otherwise the calibration is rejected.
    pub fn calibrate(&mut self, white_values: &[i32], black_values: &[i32]) -> StriderResult<()> {
        if white_values.is_empty() || black_values.is_empty() {
            return Err(StriderError::InvalidParameter(
                "light calibration needs samples of both surfaces".into(),
            ));
        }

        let mean = |values: &[i32]| -> f32 {
            values.iter().sum::<i32>() as f32 / values.len() as f32
        };
        let std_dev = |values: &[i32], mean: f32| -> f32 {
            let sum: f32 = values
                .iter()
                .map(|&v| {
                    let diff = v as f32 - mean;
                    diff * diff
                })
                .sum();
            (sum / values.len() as f32).sqrt()
        };

        let white_mean = mean(white_values);
        let black_mean = mean(black_values);
        if white_mean >= black_mean {
            return Err(StriderError::CalibrationFailed {
                attempts: 1,
                reason: format!(
                    "white (mean {white_mean:.0}) should read lower than black (mean {black_mean:.0})"
                ),
            });
        }

        let delta = black_mean - white_mean;
        if delta < MIN_CONTRAST {
            return Err(StriderError::InsufficientContrast {
                delta,
                min: MIN_CONTRAST,
            });
        }

        self.white_mean = white_mean;
        self.black_mean = black_mean;
        self.white_std_dev = std_dev(white_values, white_mean).max(1.0);
        self.black_std_dev = std_dev(black_values, black_mean).max(1.0);

        if self.white_std_dev > 0.2 * delta || self.black_std_dev > 0.2 * delta {
            warn!(
                "[light {}] noisy calibration: white stddev {:.1}, black stddev {:.1}",
                self.port(),
                self.white_std_dev,
                self.black_std_dev
            );
        }

        self.white_threshold = (white_mean + self.threshold_factor * delta) as i32;
        self.black_threshold = (black_mean - self.threshold_factor * delta) as i32;
        info!(
            "[light {}] calibrated: white mean {:.0}, black mean {:.0}, thresholds {}/{}",
            self.port(),
            white_mean,
            black_mean,
            self.white_threshold,
            self.black_threshold
        );
        Ok(())
    }

    fn gaussian(&self, value: i32, mean: f32, std_dev: f32) -> f32 {
        if std_dev <= 1e-6 {
            return 0.0;
        }
        let diff = value as f32 - mean;
        let exponent = -(diff * diff) / (2.0 * std_dev * std_dev);
        exponent.exp() / (std_dev * (2.0 * std::f32::consts::PI).sqrt())
    }

    /// Soft classification of the current reading.
    pub fn probability_of_black(&self) -> f32 {
        let value = self.value();
        let p_black = self.gaussian(value, self.black_mean, self.black_std_dev);
        let p_white = self.gaussian(value, self.white_mean, self.white_std_dev);
        let sum = p_black + p_white;
        if sum <= 1e-6 {
            return 0.5;
        }
        p_black / sum
    }

    pub fn probability_of_white(&self) -> f32 {
        1.0 - self.probability_of_black()
    }

    pub fn is_on_black(&self) -> bool {
        self.value() > self.black_threshold
    }

    pub fn is_on_white(&self) -> bool {
        self.value() < self.white_threshold
    }
}

/// Block until a front-panel button is released and pressed again.
///
/// Confirmation hook for the chassis calibration routines; lives outside
/// the control loop, so sleeping here is fine.
pub fn wait_for_button(bus: &BusHandle) {
    let poll = Duration::from_millis(10);
    while bus.any_button() {
        sleep(poll);
    }
    while !bus.any_button() {
        sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimBus;
    use std::sync::Arc;

    fn calibrated_sensor(sim: &Arc<SimBus>) -> LightSensor {
        let mut sensor = LightSensor::new(sim.clone(), 0);
        sensor
            .calibrate(&[500, 510, 490, 505], &[2800, 2790, 2810, 2805])
            .unwrap();
        sensor
    }

    #[test]
    fn test_calibrated_classification() {
        let sim = Arc::new(SimBus::new());
        let sensor = calibrated_sensor(&sim);

        sim.set_analog(0, 520);
        assert!(sensor.is_on_white());
        assert!(!sensor.is_on_black());
        assert!(sensor.probability_of_black() < 0.05);

        sim.set_analog(0, 2780);
        assert!(sensor.is_on_black());
        assert!(!sensor.is_on_white());
        assert!(sensor.probability_of_black() > 0.95);
    }

    #[test]
    fn test_insufficient_contrast_rejected() {
        let sim: Arc<SimBus> = Arc::new(SimBus::new());
        let mut sensor = LightSensor::new(sim, 1);
        let result = sensor.calibrate(&[1000, 1001], &[1050, 1051]);
        assert!(matches!(
            result,
            Err(StriderError::InsufficientContrast { .. })
        ));
    }

    #[test]
    fn test_inverted_surfaces_rejected() {
        let sim: Arc<SimBus> = Arc::new(SimBus::new());
        let mut sensor = LightSensor::new(sim, 1);
        assert!(sensor.calibrate(&[2000], &[400]).is_err());
    }

    #[test]
    fn test_distance_sensor_curve_is_monotonic() {
        let sim = Arc::new(SimBus::new());
        let sensor = DistanceSensor::new(sim.clone(), 2);
        sim.set_analog(2, 500);
        let far = sensor.distance_cm();
        sim.set_analog(2, 2500);
        let near = sensor.distance_cm();
        assert!(far > near);
    }
}
