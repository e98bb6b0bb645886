//! Interactive geometry calibration for the differential base.
//!
//! Both routines drive a measure-confirm-check cycle: the operator moves
//! the robot by hand, confirms through the injected hook (typically a
//! front-panel button), and the routine validates the encoder readings
//! before accepting them. Bad readings are retried up to the caller's cap.

use std::f32::consts::TAU;

use log::{error, info, warn};

use strider_core::error::{StriderError, StriderResult};

use super::TwoWheeled;

/// Tolerated relative difference between the two wheels' ticks/rev.
const WHEEL_MATCH_TOLERANCE: f32 = 0.05;

/// Estimate encoder ticks per wheel revolution by pushing the robot a
/// measured distance.
///
/// `confirm` blocks until the operator signals the push is complete. On
/// success the chassis geometry is updated and the value returned.
pub fn calibrate_ticks_per_revolution(
    chassis: &mut TwoWheeled,
    covered_distance_m: f32,
    max_retries: u32,
    mut confirm: impl FnMut(),
) -> StriderResult<f32> {
    if covered_distance_m <= 0.0 {
        return Err(StriderError::InvalidParameter(format!(
            "covered distance must be positive, got {covered_distance_m}"
        )));
    }
    if chassis.geometry.ticks_per_revolution > 0.0 {
        warn!(
            "ticks per revolution already calibrated ({}), overwriting",
            chassis.geometry.ticks_per_revolution
        );
    }

    info!("calibrating ticks per revolution");
    for attempt in 1..=max_retries {
        chassis.left_motor.reset_position();
        chassis.right_motor.reset_position();

        info!("attempt {attempt}/{max_retries}");
        info!("push the robot forward {covered_distance_m:.2} m, wheels rolling freely");
        info!("confirm once the robot has covered the distance");
        confirm();

        let left_ticks = chassis.left_motor.position();
        let right_ticks = chassis.right_motor.position();
        info!("encoder readings: left {left_ticks}, right {right_ticks}");

        if left_ticks.signum() != right_ticks.signum() {
            error!("encoder signs disagree (left {left_ticks}, right {right_ticks}), retrying");
            continue;
        }

        let circumference = TAU * chassis.geometry.wheel_radius;
        let left_ticks_per_rev =
            left_ticks.abs() as f32 / covered_distance_m * circumference;
        let right_ticks_per_rev =
            right_ticks.abs() as f32 / covered_distance_m * circumference;
        info!(
            "ticks per revolution: left {left_ticks_per_rev:.1}, right {right_ticks_per_rev:.1}"
        );

        let difference = (left_ticks_per_rev - right_ticks_per_rev).abs();
        let tolerance =
            WHEEL_MATCH_TOLERANCE * (left_ticks_per_rev + right_ticks_per_rev) / 2.0;
        if difference > tolerance {
            error!(
                "wheels disagree beyond tolerance ({difference:.1} > {tolerance:.1}), retrying"
            );
            continue;
        }

        let ticks_per_revolution = (left_ticks_per_rev + right_ticks_per_rev) / 2.0;
        chassis.geometry.ticks_per_revolution = ticks_per_revolution;
        info!("calibration successful: {ticks_per_revolution:.1} ticks/rev");
        return Ok(ticks_per_revolution);
    }

    Err(StriderError::CalibrationFailed {
        attempts: max_retries,
        reason: "encoder readings never agreed".into(),
    })
}

/// Estimate the wheel base by rotating the robot a full turn around its
/// locked right wheel.
pub fn calibrate_wheel_base(
    chassis: &mut TwoWheeled,
    max_retries: u32,
    mut confirm: impl FnMut(),
) -> StriderResult<f32> {
    if chassis.geometry.ticks_per_revolution <= 0.0 {
        return Err(StriderError::InvalidParameter(
            "ticks per revolution must be calibrated first".into(),
        ));
    }

    info!("calibrating wheel base");
    for attempt in 1..=max_retries {
        chassis.left_motor.reset_position();
        chassis.right_motor.reset_position();

        info!("attempt {attempt}/{max_retries}");
        info!("lock the right wheel and rotate the robot 360° around it");
        info!("confirm once the rotation is complete");
        confirm();

        let left_ticks = chassis.left_motor.position();
        let right_ticks = chassis.right_motor.position();
        info!("encoder readings: left {left_ticks}, right {right_ticks}");

        if left_ticks <= 0 {
            error!("left wheel barely moved ({left_ticks} ticks), retrying");
            continue;
        }
        if right_ticks as f32 > left_ticks as f32 * 0.1 {
            error!("right wheel moved during calibration ({right_ticks} ticks), retrying");
            continue;
        }

        let left_revolutions = left_ticks as f32 / chassis.geometry.ticks_per_revolution;
        let distance_traveled = TAU * chassis.geometry.wheel_radius * left_revolutions;
        let wheel_base = distance_traveled / TAU;
        chassis.geometry.wheel_base = wheel_base;
        info!("calibration successful: wheel base {wheel_base:.4} m");
        return Ok(wheel_base);
    }

    Err(StriderError::CalibrationFailed {
        attempts: max_retries,
        reason: "rotation readings never passed the checks".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use strider_core::hal::sim::SimBus;
    use strider_core::motor::Motor;

    fn chassis(sim: &Arc<SimBus>) -> TwoWheeled {
        TwoWheeled::new(
            Motor::new(sim.clone(), 0, false),
            Motor::new(sim.clone(), 1, false),
        )
    }

    #[test]
    fn test_ticks_calibration_averages_wheels() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);

        let bus = sim.clone();
        let result = calibrate_ticks_per_revolution(&mut chassis, 1.0, 3, move || {
            bus.set_motor_position(0, 4500);
            bus.set_motor_position(1, 4510);
        })
        .unwrap();

        // 4505 ticks/m · 2π·0.035 m/rev
        assert_relative_eq!(result, 4505.0 * TAU * 0.035, epsilon = 0.5);
        assert_relative_eq!(chassis.geometry.ticks_per_revolution, result);
    }

    #[test]
    fn test_ticks_calibration_rejects_sign_mismatch() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);

        let bus = sim.clone();
        let result = calibrate_ticks_per_revolution(&mut chassis, 1.0, 2, move || {
            bus.set_motor_position(0, -4500);
            bus.set_motor_position(1, 4500);
        });
        assert!(matches!(
            result,
            Err(StriderError::CalibrationFailed { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_ticks_calibration_rejects_bad_distance() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);
        let result = calibrate_ticks_per_revolution(&mut chassis, 0.0, 3, || {});
        assert!(matches!(result, Err(StriderError::InvalidParameter(_))));
    }

    #[test]
    fn test_wheel_base_calibration() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);
        // Left wheel travels 2π·L during a full turn around the right wheel;
        // choose ticks for a 0.18 m wheel base.
        let target_base = 0.18_f32;
        let revolutions = TAU * target_base / (TAU * chassis.geometry.wheel_radius);
        let left_ticks = (revolutions * chassis.geometry.ticks_per_revolution) as i32;

        let bus = sim.clone();
        let result = calibrate_wheel_base(&mut chassis, 3, move || {
            bus.set_motor_position(0, left_ticks);
            bus.set_motor_position(1, 3);
        })
        .unwrap();

        assert_relative_eq!(result, target_base, epsilon = 1e-3);
        assert_relative_eq!(chassis.geometry.wheel_base, target_base, epsilon = 1e-3);
    }

    #[test]
    fn test_wheel_base_rejects_moving_right_wheel() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);

        let bus = sim.clone();
        let result = calibrate_wheel_base(&mut chassis, 2, move || {
            bus.set_motor_position(0, 8000);
            bus.set_motor_position(1, 2000);
        });
        assert!(result.is_err());
    }
}
