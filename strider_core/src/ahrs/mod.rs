//! Attitude estimation: quaternion EKF and the background estimator task.

mod ekf;
mod estimator;

pub use ekf::{ecompass, Ekf};
pub use estimator::AttitudeEstimator;
