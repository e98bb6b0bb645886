//! Background attitude estimation.
//!
//! The estimator owns the fused orientation. When started it spawns a
//! managed worker that calibrates the IMU, seeds the filter, then runs the
//! EKF at the estimation rate. Only two values cross the thread boundary:
//! the yaw sample (relaxed atomic, single writer) and the full quaternion
//! behind a read-write lock for callers that want all three angles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use nalgebra::Quaternion;
use parking_lot::RwLock;

use crate::datatype::Axis;
use crate::math::quaternion_to_euler;
use crate::sensor::Imu;
use crate::thread::{spawn_managed, ManagedThread};
use crate::utility::ESTIMATION_HZ;

/// Stationary samples collected before estimation starts.
const CALIBRATION_SAMPLES: usize = 50;

/// Lower bound on the measured sensor variances fed into the filter.
const MIN_VARIANCE: f64 = 1e-6;

struct AttitudeShared {
    yaw_bits: AtomicU64,
    quaternion: RwLock<Quaternion<f64>>,
}

impl AttitudeShared {
    fn store_yaw(&self, yaw: f64) {
        self.yaw_bits.store(yaw.to_bits(), Ordering::Relaxed);
    }

    fn yaw(&self) -> f64 {
        f64::from_bits(self.yaw_bits.load(Ordering::Relaxed))
    }
}

/// Fused-attitude front end used by the motion engine.
pub struct AttitudeEstimator {
    yaw_axis: Axis,
    shared: Arc<AttitudeShared>,
    worker: Option<ManagedThread>,
}

impl AttitudeEstimator {
    pub fn new(yaw_axis: Axis) -> Self {
        Self {
            yaw_axis,
            shared: Arc::new(AttitudeShared {
                yaw_bits: AtomicU64::new(0.0_f64.to_bits()),
                quaternion: RwLock::new(Quaternion::new(1.0, 0.0, 0.0, 0.0)),
            }),
            worker: None,
        }
    }

    /// Latest gyro sample along the configured yaw axis, rad/s, positive
    /// clockwise. Reads the sensor directly so it works with the estimation
    /// thread stopped.
    pub fn gyro_reading(&self, imu: &Imu) -> f32 {
        imu.gyro.value()[self.yaw_axis.index()] as f32
    }

    /// Yaw fused by the estimation thread, radians.
    pub fn current_heading(&self) -> f64 {
        self.shared.yaw()
    }

    /// Last quaternion published by the estimation thread.
    pub fn quaternion(&self) -> Quaternion<f64> {
        *self.shared.quaternion.read()
    }

    pub fn is_estimating(&self) -> bool {
        self.worker.as_ref().is_some_and(ManagedThread::is_running)
    }

    /// Start the estimation worker.
    ///
    /// The worker first calibrates the IMU — the robot must be stationary —
    /// then seeds the filter from the calibration block and loops at the
    /// estimation rate until stopped. Starting twice is a no-op.
    pub fn start_estimation(&mut self, imu: &Imu) {
        if self.is_estimating() {
            return;
        }

        let imu = imu.clone();
        let shared = self.shared.clone();
        self.worker = Some(spawn_managed("attitude-estimator", move |stop| {
            let period = Duration::from_millis(1000 / u64::from(ESTIMATION_HZ));

            let run = match imu.calibrate(CALIBRATION_SAMPLES) {
                Ok(run) => run,
                Err(err) => {
                    error!("attitude calibration failed: {err}");
                    return;
                }
            };

            let mut ekf = crate::ahrs::Ekf::new();
            // Floor keeps the innovation covariance invertible when a
            // sensor measures perfectly still (or is simulated).
            ekf.set_measurement_noise(
                imu.gyro.variance().mean().max(MIN_VARIANCE),
                imu.accel.variance().mean().max(MIN_VARIANCE),
                imu.magneto.variance().mean().max(MIN_VARIANCE),
            );
            if let Err(err) = ekf.set_mag_reference(&run.mag_mean()) {
                error!("attitude estimator has no usable field reference: {err}");
                return;
            }
            if let Err(err) =
                ekf.compute_initial_attitude(&run.gyro, &run.accel, &run.mag, period.as_secs_f64())
            {
                error!("attitude seed failed: {err}");
                return;
            }

            debug!("attitude estimator started");
            let mut last = Instant::now();
            while !stop.load(Ordering::Relaxed) {
                let now = Instant::now();
                let dt = now.duration_since(last).as_secs_f64();
                last = now;

                let (gyro, accel, mag) = imu.reading();
                match ekf.update(&gyro, &accel, &mag, dt.max(1e-4)) {
                    Ok(q) => {
                        let (_, _, yaw) = quaternion_to_euler(&q);
                        shared.store_yaw(yaw);
                        *shared.quaternion.write() = q;
                    }
                    Err(err) => {
                        error!("attitude update failed, stopping estimation: {err}");
                        break;
                    }
                }

                let spent = now.elapsed();
                if let Some(left) = period.checked_sub(spent) {
                    std::thread::sleep(left);
                } else {
                    warn!(
                        "estimation tick took too long: {} ms",
                        spent.as_millis()
                    );
                }
            }
            debug!("attitude estimator stopped");
        }));
    }

    /// Stop and join the estimation worker. Idempotent.
    pub fn stop_estimation(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
    }
}

impl Drop for AttitudeEstimator {
    fn drop(&mut self) {
        self.stop_estimation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimBus;
    use nalgebra::Vector3;

    #[test]
    fn test_gyro_reading_selects_axis() {
        let sim = Arc::new(SimBus::new());
        sim.set_gyro(Vector3::new(10.0, 20.0, 30.0));
        let imu = Imu::new(sim);

        let estimator = AttitudeEstimator::new(Axis::Z);
        let reading = estimator.gyro_reading(&imu);
        assert!((reading - 30.0_f64.to_radians() as f32).abs() < 1e-6);
    }

    #[test]
    fn test_estimation_lifecycle_publishes_yaw() {
        let sim = Arc::new(SimBus::new());
        let imu = Imu::new(sim);
        let mut estimator = AttitudeEstimator::new(Axis::Z);

        estimator.start_estimation(&imu);
        // Calibration takes CALIBRATION_SAMPLES ticks; wait past it plus a
        // few estimation cycles.
        std::thread::sleep(Duration::from_millis(800));
        let yaw = estimator.current_heading();
        assert!(yaw.abs() < 0.3, "stationary yaw drifted to {yaw}");

        estimator.stop_estimation();
        assert!(!estimator.is_estimating());
    }
}
