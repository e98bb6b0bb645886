//! IMU access and bias calibration.
//!
//! Each sensor keeps its calibration in shared state so clones handed to the
//! attitude-estimation thread observe the same correction as the motion
//! engine. Bias is the columnwise median of a block of stationary samples;
//! variance is the per-axis mean square of the centered block.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use log::info;
use nalgebra::{Matrix3, Vector3};
use parking_lot::RwLock;

use crate::error::{StriderError, StriderResult};
use crate::hal::{BusHandle, ImuBus};
use crate::utility::ESTIMATION_HZ;

const GRAVITY: f64 = 9.81;

/// Columnwise median of a block of samples.
fn columnwise_median(samples: &[Vector3<f64>]) -> Vector3<f64> {
    let mut median = Vector3::zeros();
    for axis in 0..3 {
        let mut column: Vec<f64> = samples.iter().map(|s| s[axis]).collect();
        column.sort_by(|a, b| a.total_cmp(b));
        let n = column.len();
        median[axis] = if n % 2 == 0 {
            (column[n / 2 - 1] + column[n / 2]) / 2.0
        } else {
            column[n / 2]
        };
    }
    median
}

/// Per-axis mean square of samples centered on `offset`.
fn centered_variance(samples: &[Vector3<f64>], offset: &Vector3<f64>) -> Vector3<f64> {
    let mut variance = Vector3::zeros();
    for sample in samples {
        let centered = sample - offset;
        variance += centered.component_mul(&centered);
    }
    variance / samples.len() as f64
}

#[derive(Debug, Clone)]
struct VectorCal {
    bias: Vector3<f64>,
    variance: Vector3<f64>,
}

impl Default for VectorCal {
    fn default() -> Self {
        Self {
            bias: Vector3::zeros(),
            variance: Vector3::from_element(1.0),
        }
    }
}

/// Gyroscope with bias correction; values in rad/s.
#[derive(Clone)]
pub struct GyroSensor {
    bus: BusHandle,
    cal: Arc<RwLock<VectorCal>>,
}

impl GyroSensor {
    pub fn new(bus: BusHandle) -> Self {
        Self {
            bus,
            cal: Arc::new(RwLock::new(VectorCal::default())),
        }
    }

    /// Raw read converted to rad/s, before bias correction.
    fn raw(&self) -> Vector3<f64> {
        self.bus.gyro().map(f64::to_radians)
    }

    /// Bias-corrected angular rate in rad/s.
    pub fn value(&self) -> Vector3<f64> {
        self.raw() - self.cal.read().bias
    }

    pub fn bias(&self) -> Vector3<f64> {
        self.cal.read().bias
    }

    pub fn variance(&self) -> Vector3<f64> {
        self.cal.read().variance
    }

    /// Estimate bias and variance from stationary samples (rad/s).
    pub fn calibrate(&self, samples: &[Vector3<f64>]) {
        let bias = columnwise_median(samples);
        let variance = centered_variance(samples, &bias);
        info!(
            "[IMU] gyro bias ({:.5}, {:.5}, {:.5}), variance ({:.2e}, {:.2e}, {:.2e})",
            bias[0], bias[1], bias[2], variance[0], variance[1], variance[2]
        );
        *self.cal.write() = VectorCal { bias, variance };
    }
}

#[derive(Debug, Clone, Default)]
struct AccelCal {
    cal: VectorCal,
    gravity: Option<Vector3<f64>>,
}

/// Accelerometer with bias correction; values in m/s².
#[derive(Clone)]
pub struct AccelSensor {
    bus: BusHandle,
    cal: Arc<RwLock<AccelCal>>,
}

impl AccelSensor {
    pub fn new(bus: BusHandle) -> Self {
        Self {
            bus,
            cal: Arc::new(RwLock::new(AccelCal::default())),
        }
    }

    /// Bias-corrected acceleration in m/s². Gravity stays in the signal;
    /// only sensor offset is removed.
    pub fn value(&self) -> Vector3<f64> {
        self.bus.accel() - self.cal.read().cal.bias
    }

    pub fn bias(&self) -> Vector3<f64> {
        self.cal.read().cal.bias
    }

    pub fn variance(&self) -> Vector3<f64> {
        self.cal.read().cal.variance
    }

    /// Gravity vector detected during calibration, if any.
    pub fn gravity(&self) -> Option<Vector3<f64>> {
        self.cal.read().gravity
    }

    /// Estimate bias and variance from stationary samples.
    ///
    /// The gravity axis is the component with the largest median magnitude;
    /// gravity is subtracted from the bias along it and recorded separately.
    pub fn calibrate(&self, samples: &[Vector3<f64>]) {
        let mut bias = columnwise_median(samples);

        let gravity_axis = bias.iamax();
        let gravity_sign = if bias[gravity_axis] > 0.0 { 1.0 } else { -1.0 };
        bias[gravity_axis] -= GRAVITY * gravity_sign;

        let mut gravity = Vector3::zeros();
        gravity[gravity_axis] = GRAVITY * gravity_sign;
        info!(
            "[IMU] gravity axis {} ({})",
            gravity_axis,
            if gravity_sign > 0.0 { "+" } else { "-" }
        );

        let variance = centered_variance(samples, &bias);
        info!(
            "[IMU] accel bias ({:.4}, {:.4}, {:.4}), variance ({:.2e}, {:.2e}, {:.2e})",
            bias[0], bias[1], bias[2], variance[0], variance[1], variance[2]
        );
        *self.cal.write() = AccelCal {
            cal: VectorCal { bias, variance },
            gravity: Some(gravity),
        };
    }
}

#[derive(Debug, Clone)]
struct MagnetoCal {
    hard_iron: Vector3<f64>,
    soft_iron: Matrix3<f64>,
    inv_soft_iron: Matrix3<f64>,
    variance: Vector3<f64>,
}

impl Default for MagnetoCal {
    fn default() -> Self {
        Self {
            hard_iron: Vector3::zeros(),
            soft_iron: Matrix3::identity(),
            inv_soft_iron: Matrix3::identity(),
            variance: Vector3::from_element(1.0),
        }
    }
}

/// Magnetometer with hard-/soft-iron correction; values in µT.
#[derive(Clone)]
pub struct MagnetoSensor {
    bus: BusHandle,
    cal: Arc<RwLock<MagnetoCal>>,
}

impl MagnetoSensor {
    pub fn new(bus: BusHandle) -> Self {
        Self {
            bus,
            cal: Arc::new(RwLock::new(MagnetoCal::default())),
        }
    }

    /// Iron-corrected field: `soft_iron⁻¹ · (raw − hard_iron)`.
    pub fn value(&self) -> Vector3<f64> {
        let cal = self.cal.read();
        cal.inv_soft_iron * (self.bus.magneto() - cal.hard_iron)
    }

    pub fn variance(&self) -> Vector3<f64> {
        self.cal.read().variance
    }

    pub fn set_hard_iron_offset(&self, offset: Vector3<f64>) {
        self.cal.write().hard_iron = offset;
    }

    /// Install the soft-iron matrix. The inverse is computed here, once,
    /// rather than on every read.
    pub fn set_soft_iron_matrix(&self, matrix: Matrix3<f64>) -> StriderResult<()> {
        let inverse = matrix
            .try_inverse()
            .ok_or(StriderError::DegenerateVector("soft-iron matrix"))?;
        let mut cal = self.cal.write();
        cal.soft_iron = matrix;
        cal.inv_soft_iron = inverse;
        Ok(())
    }

    /// Record the field variance from iron-corrected stationary samples.
    pub fn calibrate(&self, samples: &[Vector3<f64>]) {
        let mean = columnwise_median(samples);
        let variance = centered_variance(samples, &mean);
        info!(
            "[IMU] magneto variance ({:.3}, {:.3}, {:.3})",
            variance[0], variance[1], variance[2]
        );
        self.cal.write().variance = variance;
    }
}

/// Calibrated sample block produced by [`Imu::calibrate`], consumed by the
/// attitude seed.
pub struct CalibrationRun {
    pub gyro: Vec<Vector3<f64>>,
    pub accel: Vec<Vector3<f64>>,
    pub mag: Vec<Vector3<f64>>,
}

impl CalibrationRun {
    /// Mean of the calibrated magnetometer block, the local field reference.
    pub fn mag_mean(&self) -> Vector3<f64> {
        self.mag.iter().sum::<Vector3<f64>>() / self.mag.len() as f64
    }
}

/// The inertial unit: gyro, accelerometer and magnetometer sharing one bus.
#[derive(Clone)]
pub struct Imu {
    pub gyro: GyroSensor,
    pub accel: AccelSensor,
    pub magneto: MagnetoSensor,
}

impl Imu {
    pub fn new(bus: BusHandle) -> Self {
        Self {
            gyro: GyroSensor::new(bus.clone()),
            accel: AccelSensor::new(bus.clone()),
            magneto: MagnetoSensor::new(bus),
        }
    }

    /// One calibrated reading of all three sensors.
    pub fn reading(&self) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        (
            self.gyro.value(),
            self.accel.value(),
            self.magneto.value(),
        )
    }

    /// Collect `sample_count` stationary samples at the estimation rate and
    /// calibrate all three sensors. The robot must not move while this runs.
    pub fn calibrate(&self, sample_count: usize) -> StriderResult<CalibrationRun> {
        if sample_count == 0 {
            return Err(StriderError::InvalidParameter(
                "calibration needs at least one sample".into(),
            ));
        }

        info!("[IMU] calibrating, keep the robot still");
        let mut gyro_raw = Vec::with_capacity(sample_count);
        let mut accel_raw = Vec::with_capacity(sample_count);
        let mut mag_corrected = Vec::with_capacity(sample_count);
        let period = Duration::from_millis(1000 / u64::from(ESTIMATION_HZ));
        for _ in 0..sample_count {
            gyro_raw.push(self.gyro.raw());
            accel_raw.push(self.accel.bus.accel());
            mag_corrected.push(self.magneto.value());
            sleep(period);
        }

        self.gyro.calibrate(&gyro_raw);
        self.accel.calibrate(&accel_raw);
        self.magneto.calibrate(&mag_corrected);

        let gyro_bias = self.gyro.bias();
        let accel_bias = self.accel.bias();
        info!("[IMU] calibration complete");
        Ok(CalibrationRun {
            gyro: gyro_raw.iter().map(|s| s - gyro_bias).collect(),
            accel: accel_raw.iter().map(|s| s - accel_bias).collect(),
            mag: mag_corrected,
        })
    }
}
