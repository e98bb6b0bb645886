//! Error types shared across the STRIDER workspace.

use thiserror::Error;

/// Result alias used throughout STRIDER.
pub type StriderResult<T> = Result<T, StriderError>;

/// Errors surfaced by the motion core.
///
/// The motion engine itself never fails mid-loop: it logs, clamps and exits
/// when its conditional completes. These errors cover the operations around
/// it — attitude math with degenerate inputs, calibration that exhausted its
/// retries, and plainly invalid parameters.
#[derive(Debug, Error)]
pub enum StriderError {
    /// Integration or differentiation was asked to run over a non-positive
    /// time step.
    #[error("time step must be positive, got {0}")]
    InvalidTimeStep(f64),

    /// The a-priori quaternion handed to the EKF drifted off the unit sphere.
    #[error("attitude quaternion must be unit length, |q| = {0}")]
    NonUnitQuaternion(f64),

    /// A sensor vector was too close to zero to normalize.
    #[error("{0} vector has near-zero magnitude")]
    DegenerateVector(&'static str),

    /// The EKF innovation covariance could not be inverted.
    #[error("innovation covariance is not invertible")]
    SingularInnovation,

    /// A servo was commanded outside its mechanical range.
    #[error("servo position {position} outside 0..={max}")]
    ServoPositionOutOfRange { position: i32, max: i32 },

    /// A caller-supplied parameter made the requested operation meaningless.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A calibration routine ran out of retries.
    #[error("calibration failed after {attempts} attempts: {reason}")]
    CalibrationFailed { attempts: u32, reason: String },

    /// Light-sensor calibration could not separate white from black.
    #[error("insufficient contrast between surfaces: delta {delta:.1} < {min:.1}")]
    InsufficientContrast { delta: f32, min: f32 },
}
