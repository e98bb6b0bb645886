//! Quaternion extended Kalman filter over gyro, accelerometer and
//! magnetometer samples in the NED frame.
//!
//! State is the unit quaternion `q` with 4×4 covariance `P`. Prediction
//! integrates the angular rate to first order; the correction step compares
//! the normalized accel/mag measurement against the gravity and field
//! references rotated into the body frame.

use nalgebra::{
    Matrix3, Matrix3x4, Matrix4, Matrix6, Quaternion, Rotation3, UnitQuaternion, Vector3, Vector6,
};

use crate::error::{StriderError, StriderResult};

/// Default sensor noise variances, replaced by measured values once the IMU
/// has been calibrated.
const DEFAULT_VAR_GYRO: f64 = 0.3;
const DEFAULT_VAR_ACCEL: f64 = 0.5;
const DEFAULT_VAR_MAG: f64 = 0.8;

/// Orientation from a single accelerometer + magnetometer sample.
///
/// Builds the NED triad (`Rz` down from gravity, `Ry` = down × field,
/// `Rx` closing the frame) and converts it to a quaternion. Fails on
/// near-zero or parallel input vectors.
pub fn ecompass(acc: &Vector3<f64>, mag: &Vector3<f64>) -> StriderResult<Quaternion<f64>> {
    let a_norm = acc.norm();
    if a_norm < 1e-12 {
        return Err(StriderError::DegenerateVector("accelerometer"));
    }
    let rz = acc / a_norm;

    let m_norm = mag.norm();
    if m_norm < 1e-12 {
        return Err(StriderError::DegenerateVector("magnetometer"));
    }
    let m_unit = mag / m_norm;

    let mut ry = rz.cross(&m_unit);
    if ry.norm() < 1e-12 {
        return Err(StriderError::DegenerateVector("down × field"));
    }
    ry.normalize_mut();

    let mut rx = ry.cross(&rz);
    if rx.norm() < 1e-12 {
        return Err(StriderError::DegenerateVector("triad x"));
    }
    rx.normalize_mut();

    let rotation = Matrix3::new(
        rx.x, rx.y, rx.z, //
        ry.x, ry.y, ry.z, //
        rz.x, rz.y, rz.z,
    );
    let unit = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
    Ok(unit.into_inner())
}

/// The standard 4×4 skew form of a 3-vector for quaternion kinematics.
fn omega(x: &Vector3<f64>) -> Matrix4<f64> {
    Matrix4::new(
        0.0, -x.x, -x.y, -x.z, //
        x.x, 0.0, x.z, -x.y, //
        x.y, -x.z, 0.0, x.x, //
        x.z, x.y, -x.x, 0.0,
    )
}

/// Jacobian block of the rotated reference vector w.r.t. the quaternion
/// components (before the common factor of 2).
fn rotation_block(reference: &Vector3<f64>, q: &Quaternion<f64>) -> Matrix3x4<f64> {
    let (rx, ry, rz) = (reference.x, reference.y, reference.z);
    let (qw, qx, qy, qz) = (q.w, q.i, q.j, q.k);
    Matrix3x4::new(
        rx * qw + ry * qz - rz * qy,
        rx * qx + ry * qy + rz * qz,
        -rx * qy + ry * qx - rz * qw,
        -rx * qz + ry * qw + rz * qx,
        //
        -rx * qz + ry * qw + rz * qx,
        rx * qy - ry * qx + rz * qw,
        rx * qx + ry * qy + rz * qz,
        -rx * qw - ry * qz + rz * qy,
        //
        rx * qy - ry * qx + rz * qw,
        rx * qz - ry * qw - rz * qx,
        rx * qw + ry * qz - rz * qy,
        rx * qx + ry * qy + rz * qz,
    )
}

/// Quaternion EKF.
pub struct Ekf {
    q: Quaternion<f64>,
    p: Matrix4<f64>,
    r: Matrix6<f64>,
    var_gyro: f64,
    var_accel: f64,
    var_mag: f64,
    a_ref: Vector3<f64>,
    m_ref: Vector3<f64>,
}

impl Default for Ekf {
    fn default() -> Self {
        Self::new()
    }
}

impl Ekf {
    pub fn new() -> Self {
        let mut ekf = Self {
            q: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            p: Matrix4::identity(),
            r: Matrix6::zeros(),
            var_gyro: DEFAULT_VAR_GYRO,
            var_accel: DEFAULT_VAR_ACCEL,
            var_mag: DEFAULT_VAR_MAG,
            a_ref: Vector3::new(0.0, 0.0, 1.0),
            m_ref: Vector3::new(1.0, 0.0, 0.0),
        };
        ekf.r = ekf.measurement_noise_covariance();
        ekf
    }

    pub fn quaternion(&self) -> Quaternion<f64> {
        self.q
    }

    pub fn set_quaternion(&mut self, q: Quaternion<f64>) {
        self.q = q.normalize();
    }

    /// Install the local magnetic field reference; gravity stays unit-down.
    pub fn set_mag_reference(&mut self, field: &Vector3<f64>) -> StriderResult<()> {
        if field.norm() < 1e-12 {
            return Err(StriderError::DegenerateVector("magnetic reference"));
        }
        self.m_ref = field.normalize();
        self.a_ref = Vector3::new(0.0, 0.0, 1.0);
        Ok(())
    }

    /// Replace the sensor noise variances and rebuild `R`.
    pub fn set_measurement_noise(&mut self, var_gyro: f64, var_accel: f64, var_mag: f64) {
        self.var_gyro = var_gyro;
        self.var_accel = var_accel;
        self.var_mag = var_mag;
        self.r = self.measurement_noise_covariance();
    }

    fn measurement_noise_covariance(&self) -> Matrix6<f64> {
        let mut diagonal = Vector6::from_element(self.var_accel);
        diagonal[3] = self.var_mag;
        diagonal[4] = self.var_mag;
        diagonal[5] = self.var_mag;
        Matrix6::from_diagonal(&diagonal)
    }

    /// Seed `q` from a block of stationary samples: ecompass on the first
    /// sample, then the remaining samples folded through the filter at a
    /// fixed time step.
    pub fn compute_initial_attitude(
        &mut self,
        gyro: &[Vector3<f64>],
        accel: &[Vector3<f64>],
        mag: &[Vector3<f64>],
        dt: f64,
    ) -> StriderResult<()> {
        if gyro.is_empty() || gyro.len() != accel.len() || gyro.len() != mag.len() {
            return Err(StriderError::InvalidParameter(
                "attitude seed needs equal, non-empty sample blocks".into(),
            ));
        }

        self.q = ecompass(&accel[0], &mag[0])?.normalize();
        for i in 1..gyro.len() {
            self.update(&gyro[i], &accel[i], &mag[i], dt)?;
        }
        Ok(())
    }

    /// First-order quaternion propagation by the angular rate.
    fn propagate(q: &Quaternion<f64>, rate: &Vector3<f64>, dt: f64) -> Quaternion<f64> {
        let half = 0.5 * dt * rate;
        let delta = Quaternion::new(1.0, half.x, half.y, half.z).normalize();
        q * delta
    }

    /// State-transition Jacobian `F = I + Ω(½·dt·ω)`.
    fn transition_jacobian(rate: &Vector3<f64>, dt: f64) -> Matrix4<f64> {
        Matrix4::identity() + omega(&(0.5 * dt * rate))
    }

    /// Expected measurement: both references rotated into the body frame.
    fn expected_measurement(&self, q: &Quaternion<f64>) -> Vector6<f64> {
        let rotation = UnitQuaternion::from_quaternion(*q);
        let accel = rotation.transform_vector(&self.a_ref);
        let mag = rotation.transform_vector(&self.m_ref);
        Vector6::new(accel.x, accel.y, accel.z, mag.x, mag.y, mag.z)
    }

    fn measurement_jacobian(&self, q: &Quaternion<f64>) -> nalgebra::Matrix6x4<f64> {
        let top = rotation_block(&self.a_ref, q);
        let bottom = rotation_block(&self.m_ref, q);
        let mut jacobian = nalgebra::Matrix6x4::zeros();
        jacobian.fixed_view_mut::<3, 4>(0, 0).copy_from(&top);
        jacobian.fixed_view_mut::<3, 4>(3, 0).copy_from(&bottom);
        2.0 * jacobian
    }

    /// One predict/correct cycle.
    ///
    /// `gyro` in rad/s; `accel` and `mag` in any consistent unit (they are
    /// normalized before entering the innovation). Fails loudly on a
    /// non-positive `dt`, a drifted state quaternion, or degenerate
    /// measurement vectors; the state is untouched on error.
    pub fn update(
        &mut self,
        gyro: &Vector3<f64>,
        accel: &Vector3<f64>,
        mag: &Vector3<f64>,
        dt: f64,
    ) -> StriderResult<Quaternion<f64>> {
        if dt <= 0.0 {
            return Err(StriderError::InvalidTimeStep(dt));
        }
        let norm = self.q.norm();
        if (norm - 1.0).abs() > 1e-9 {
            return Err(StriderError::NonUnitQuaternion(norm));
        }
        if accel.norm() < 1e-12 {
            return Err(StriderError::DegenerateVector("accelerometer"));
        }
        if mag.norm() < 1e-12 {
            return Err(StriderError::DegenerateVector("magnetometer"));
        }

        // Predict.
        let q_pred = Self::propagate(&self.q, gyro, dt);
        let f = Self::transition_jacobian(gyro, dt);
        let process_noise = self.var_gyro * (f * f.transpose());
        let p_pred = f * self.p * f.transpose() + process_noise;

        // Correct.
        let a_unit = accel.normalize();
        let m_unit = mag.normalize();
        let z = Vector6::new(a_unit.x, a_unit.y, a_unit.z, m_unit.x, m_unit.y, m_unit.z);
        let z_pred = self.expected_measurement(&q_pred);
        let h = self.measurement_jacobian(&q_pred);
        let s = h * p_pred * h.transpose() + self.r;
        let s_inv = s.try_inverse().ok_or(StriderError::SingularInnovation)?;
        let gain = p_pred * h.transpose() * s_inv;
        let correction = gain * (z - z_pred);

        let dq = Quaternion::new(
            1.0,
            0.5 * correction[0],
            0.5 * correction[1],
            0.5 * correction[2],
        )
        .normalize();
        self.q = (q_pred * dq).normalize();
        self.p = (Matrix4::identity() - gain * h) * p_pred;
        Ok(self.q)
    }
}
