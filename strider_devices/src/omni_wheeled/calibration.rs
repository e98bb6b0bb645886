//! Geometry calibration for the omni base.

use std::f32::consts::TAU;

use log::{error, info, warn};

use strider_core::error::{StriderError, StriderResult};

use super::OmniWheeled;

/// Estimate encoder ticks per wheel revolution by pushing the robot a
/// measured distance straight forward.
///
/// All four encoders are averaged by magnitude; attempts with negligible
/// movement are rejected. `confirm` blocks until the operator signals the
/// push is complete.
pub fn calibrate_ticks_per_revolution(
    chassis: &mut OmniWheeled,
    covered_distance_m: f32,
    max_retries: u32,
    mut confirm: impl FnMut(),
) -> StriderResult<f32> {
    if covered_distance_m <= 0.0 {
        return Err(StriderError::InvalidParameter(format!(
            "covered distance must be positive, got {covered_distance_m}"
        )));
    }

    info!("calibrating ticks per revolution (omni)");
    for attempt in 1..=max_retries {
        chassis.front_right_motor.reset_position();
        chassis.front_left_motor.reset_position();
        chassis.rear_left_motor.reset_position();
        chassis.rear_right_motor.reset_position();

        info!("attempt {attempt}/{max_retries}");
        info!("push the robot forward exactly {covered_distance_m:.2} m, then confirm");
        confirm();

        let fr = chassis.front_right_motor.position();
        let fl = chassis.front_left_motor.position();
        let rl = chassis.rear_left_motor.position();
        let rr = chassis.rear_right_motor.position();
        info!("encoders: FR {fr}, FL {fl}, RL {rl}, RR {rr}");

        let average = (fr.abs() + fl.abs() + rl.abs() + rr.abs()) as f32 / 4.0;
        if average < 1.0 {
            warn!("average movement under one tick, retrying");
            continue;
        }

        let ticks_per_meter = average / covered_distance_m;
        let circumference = TAU * chassis.geometry.wheel_radius;
        let ticks_per_revolution = ticks_per_meter * circumference;
        if !ticks_per_revolution.is_finite() || ticks_per_revolution <= 0.0 {
            error!("computed invalid ticks/rev {ticks_per_revolution}, retrying");
            continue;
        }

        chassis.geometry.ticks_per_revolution = ticks_per_revolution;
        info!("calibration successful: {ticks_per_revolution:.1} ticks/rev");
        return Ok(ticks_per_revolution);
    }

    Err(StriderError::CalibrationFailed {
        attempts: max_retries,
        reason: "no usable encoder movement".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use strider_core::hal::sim::SimBus;
    use strider_core::motor::Motor;

    fn chassis(sim: &Arc<SimBus>) -> OmniWheeled {
        OmniWheeled::new(
            Motor::new(sim.clone(), 0, false),
            Motor::new(sim.clone(), 1, false),
            Motor::new(sim.clone(), 2, false),
            Motor::new(sim.clone(), 3, false),
        )
    }

    #[test]
    fn test_averages_all_four_wheels() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);

        let bus = sim.clone();
        let result = calibrate_ticks_per_revolution(&mut chassis, 0.5, 3, move || {
            for port in 0..4 {
                bus.set_motor_position(port, 2250 + i32::from(port));
            }
        })
        .unwrap();

        let expected = (2251.5 / 0.5) * TAU * 0.035;
        assert_relative_eq!(result, expected, epsilon = 0.5);
    }

    #[test]
    fn test_rejects_no_movement() {
        let sim = Arc::new(SimBus::new());
        let mut chassis = chassis(&sim);
        let result = calibrate_ticks_per_revolution(&mut chassis, 0.5, 2, || {});
        assert!(matches!(
            result,
            Err(StriderError::CalibrationFailed { .. })
        ));
    }
}
