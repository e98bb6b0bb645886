//! Constructors for the conditional and speed functions the motion engine
//! consumes.
//!
//! A conditional function is called with `true` exactly once at loop start
//! (type-check mode: returns a default-initialized result so callers can
//! dispatch on the variant) and with `false` on every subsequent tick.

use std::time::{Duration, Instant};

use log::debug;

use super::conditions::{ConditionalResult, Progress};
use super::speed::Speed;
use crate::math;

/// Loop-termination predicate: `f(type_check_only) -> ConditionalResult`.
pub type ConditionalFunction<'a> = Box<dyn FnMut(bool) -> ConditionalResult + 'a>;

/// Velocity generator: maps the live conditional result to a [`Speed`].
pub type SpeedFunction<'a> = Box<dyn FnMut(&ConditionalResult) -> Speed + 'a>;

/// Run until `duration` of wall time has elapsed since the first live call.
pub fn for_time(duration: Duration) -> ConditionalFunction<'static> {
    let target_ms = duration.as_millis() as f32;
    let mut start: Option<Instant> = None;
    Box::new(move |type_check_only| {
        let mut progress = Progress::new(target_ms);
        if !type_check_only {
            let now = Instant::now();
            let start = start.get_or_insert(now);
            progress.current = now.duration_since(*start).as_millis() as f32;
        }
        ConditionalResult::Timed(progress)
    })
}

/// Run for a duration given in seconds.
pub fn for_seconds(seconds: f32) -> ConditionalFunction<'static> {
    debug!("for_seconds conditional with {seconds} s");
    for_time(Duration::from_millis((seconds * 1000.0) as u64))
}

/// Run until the driven distance reaches `distance_cm` centimetres.
pub fn for_distance(distance_cm: f32) -> ConditionalFunction<'static> {
    debug!("for_distance conditional with {distance_cm} cm");
    Box::new(move |_| ConditionalResult::Distance(Progress::new(distance_cm / 100.0)))
}

/// Run until the robot has rotated `degrees` clockwise.
pub fn for_cw_rotation(degrees: f32) -> ConditionalFunction<'static> {
    debug!("for_cw_rotation conditional with {degrees} deg");
    Box::new(move |_| ConditionalResult::Rotation(Progress::new(degrees.to_radians())))
}

/// Run until the robot has rotated `degrees` counter-clockwise.
pub fn for_ccw_rotation(degrees: f32) -> ConditionalFunction<'static> {
    for_cw_rotation(-degrees)
}

/// Encoder-tick goal for the motor primitives.
pub fn for_ticks(ticks: i32) -> ConditionalFunction<'static> {
    debug!("for_ticks conditional with {ticks} ticks");
    Box::new(move |_| ConditionalResult::MotorTicks(Progress::new(ticks as f32)))
}

/// Run while the supplied predicate is true.
pub fn while_true<'a>(mut condition: impl FnMut() -> bool + 'a) -> ConditionalFunction<'a> {
    Box::new(move |_| ConditionalResult::Undefined {
        condition_met: condition(),
    })
}

/// Run while the supplied predicate is false.
pub fn while_false<'a>(mut condition: impl FnMut() -> bool + 'a) -> ConditionalFunction<'a> {
    Box::new(move |_| ConditionalResult::Undefined {
        condition_met: !condition(),
    })
}

/// Always emit the same speed.
pub fn constant(speed: Speed) -> SpeedFunction<'static> {
    Box::new(move |_| speed)
}

/// Interpolate componentwise from `start` to `end` by the conditional's
/// progress.
pub fn lerp(start: Speed, end: Speed) -> SpeedFunction<'static> {
    Box::new(move |result| {
        let t = result.progress();
        Speed::new(
            math::lerp(start.forward, end.forward, t),
            math::lerp(start.strafe, end.strafe, t),
            math::lerp(start.angular, end.angular, t),
        )
    })
}

/// Call a generator on every tick, ignoring the conditional.
pub fn generator<'a>(mut generate: impl FnMut() -> Speed + 'a) -> SpeedFunction<'a> {
    Box::new(move |_| generate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::DriveState;

    #[test]
    fn test_type_check_returns_correct_variant_with_zero_progress() {
        let mut state = DriveState::default();
        let checks: [(ConditionalFunction<'static>, fn(&ConditionalResult) -> bool); 4] = [
            (for_seconds(1.0), |r| matches!(r, ConditionalResult::Timed(_))),
            (for_distance(50.0), |r| {
                matches!(r, ConditionalResult::Distance(_))
            }),
            (for_cw_rotation(90.0), |r| {
                matches!(r, ConditionalResult::Rotation(_))
            }),
            (for_ticks(200), |r| {
                matches!(r, ConditionalResult::MotorTicks(_))
            }),
        ];
        for (mut condition, has_tag) in checks {
            let mut result = condition(true);
            assert!(has_tag(&result));
            assert_eq!(result.progress(), 0.0);
            // A live call must keep the same tag.
            result = condition(false);
            result.update(&mut state, (0.0, 0.0));
            assert!(has_tag(&result));
        }
    }

    #[test]
    fn test_timed_conditional_elapses() {
        let mut condition = for_time(Duration::from_millis(30));
        assert!(condition(false).is_loop_running());
        std::thread::sleep(Duration::from_millis(45));
        assert!(!condition(false).is_loop_running());
    }

    #[test]
    fn test_rotation_sign_conventions() {
        let mut cw = for_cw_rotation(90.0);
        let mut ccw = for_ccw_rotation(90.0);
        assert_eq!(cw(true).target(), Some(90.0_f32.to_radians()));
        assert_eq!(ccw(true).target(), Some(-90.0_f32.to_radians()));
    }

    #[test]
    fn test_while_true_tracks_predicate() {
        let mut flag = true;
        {
            let mut condition = while_true(|| flag);
            assert!(condition(false).is_loop_running());
        }
        flag = false;
        let mut condition = while_true(|| flag);
        assert!(!condition(false).is_loop_running());
    }

    #[test]
    fn test_lerp_speed_function_tracks_progress() {
        let mut speed_fn = lerp(Speed::stop(), Speed::new(1.0, 0.5, -1.0));
        let mut progress = Progress::new(1.0);
        progress.current = 0.5;
        let speed = speed_fn(&ConditionalResult::Distance(progress));
        assert_eq!(speed, Speed::new(0.5, 0.25, -0.5));
    }

    #[test]
    fn test_constant_ignores_result() {
        let mut speed_fn = constant(Speed::MEDIUM);
        let result = ConditionalResult::Undefined {
            condition_met: true,
        };
        assert_eq!(speed_fn(&result), Speed::MEDIUM);
    }
}
