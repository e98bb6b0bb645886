//! Sensor adapters: the IMU trio with its calibration state, and the
//! ground-facing analog/digital sensors used by the motion primitives.

mod ground;
mod imu;

pub use ground::{
    wait_for_button, AnalogSensor, DigitalSensor, DistanceSensor, LightSensor,
};
pub use imu::{AccelSensor, CalibrationRun, GyroSensor, Imu, MagnetoSensor};
