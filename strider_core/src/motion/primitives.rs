//! Motion primitives: thin compositions over `set_speed_while`.

use crate::datatype::{
    constant, while_false, while_true, ConditionalFunction, Speed, SpeedFunction,
};
use crate::device::{Chassis, Device};
use crate::math;
use crate::motion::SpeedWhile;
use crate::sensor::LightSensor;

/// Angular nudge applied while a line-follow sensor reads black.
const LINE_NUDGE: f32 = 0.26;

/// Approach fraction used by line-up phase one.
const LINE_UP_APPROACH: f32 = 0.4;
/// Per-wheel corrections in phase two: back off a wheel over the line,
/// creep a wheel that is not there yet.
const LINE_UP_BACKOFF: f32 = 0.05;
const LINE_UP_CREEP: f32 = 0.015;
/// Retreat fraction of phase three.
const LINE_UP_RETREAT: f32 = 0.01;

/// Drive straight: the speed function's strafe and angular components are
/// discarded, heading holds the line.
pub fn drive_straight<'a, C: Chassis>(
    device: &'a mut Device<C>,
    condition: ConditionalFunction<'a>,
    mut speed_fn: SpeedFunction<'a>,
) -> SpeedWhile<'a, C> {
    device.set_speed_while(
        condition,
        Box::new(move |result| Speed::planar(speed_fn(result).forward, 0.0)),
    )
}

/// Rotate in place: only the angular component of the speed function is
/// used.
pub fn rotate<'a, C: Chassis>(
    device: &'a mut Device<C>,
    condition: ConditionalFunction<'a>,
    mut speed_fn: SpeedFunction<'a>,
) -> SpeedWhile<'a, C> {
    device.set_speed_while(
        condition,
        Box::new(move |result| Speed::new(0.0, 0.0, speed_fn(result).angular)),
    )
}

/// Follow a line between two downward-facing light sensors.
///
/// Whichever sensor sees black steers the robot back over the line; the
/// nudge direction flips with the sign of the forward speed so the same
/// sensors work driving backwards.
pub fn follow_line<'a, C: Chassis>(
    device: &'a mut Device<C>,
    left: &'a LightSensor,
    right: &'a LightSensor,
    condition: ConditionalFunction<'a>,
    mut speed_fn: SpeedFunction<'a>,
) -> SpeedWhile<'a, C> {
    device.set_speed_while(
        condition,
        Box::new(move |result| {
            let current = speed_fn(result);
            let direction = math::signf(current.forward);
            let angular = if left.is_on_black() {
                direction * LINE_NUDGE
            } else if right.is_on_black() {
                -direction * LINE_NUDGE
            } else {
                0.0
            };
            Speed::planar(current.forward, angular)
        }),
    )
}

/// Square up against a line ahead of the robot.
pub fn forward_line_up<C: Chassis>(
    device: &mut Device<C>,
    left: &LightSensor,
    right: &LightSensor,
) {
    line_up(device, left, right, 1.0);
}

/// Square up against a line behind the robot.
pub fn backward_line_up<C: Chassis>(
    device: &mut Device<C>,
    left: &LightSensor,
    right: &LightSensor,
) {
    line_up(device, left, right, -1.0);
}

/// Three-phase squaring sequence: advance until both sensors see black,
/// micro-correct each side while either still does, then retreat until the
/// line is just released.
fn line_up<C: Chassis>(
    device: &mut Device<C>,
    left: &LightSensor,
    right: &LightSensor,
    sign: f32,
) {
    device
        .set_speed_while(
            while_false(|| left.is_on_black() && right.is_on_black()),
            constant(Speed::planar(sign * LINE_UP_APPROACH, 0.0)),
        )
        .run();

    device
        .set_speed_while(
            while_true(|| left.is_on_black() || right.is_on_black()),
            Box::new(move |_| {
                let left_speed = if left.is_on_black() {
                    -LINE_UP_BACKOFF * sign
                } else {
                    LINE_UP_CREEP * sign
                };
                let right_speed = if right.is_on_black() {
                    -LINE_UP_BACKOFF * sign
                } else {
                    LINE_UP_CREEP * sign
                };
                Speed::from_wheels(left_speed, right_speed)
            }),
        )
        .run();

    device
        .set_speed_while(
            while_false(|| left.is_on_black() || right.is_on_black()),
            constant(Speed::planar(-LINE_UP_RETREAT * sign, 0.0)),
        )
        .run();
}
