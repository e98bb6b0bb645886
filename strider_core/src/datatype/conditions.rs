use std::fmt;

use crate::motion::DriveState;

/// Target/current bookkeeping shared by the defined conditional variants.
///
/// `target` is stored in the same unit `current` is measured in (metres for
/// distances, radians for rotations, milliseconds for time, encoder ticks
/// for motor goals), so `fraction()` is a genuine 0..1 progress value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub target: f32,
    pub current: f32,
    pub running: bool,
}

impl Progress {
    pub fn new(target: f32) -> Self {
        Self {
            target,
            current: 0.0,
            running: false,
        }
    }

    pub fn fraction(&self) -> f32 {
        if self.target == 0.0 {
            return 0.0;
        }
        self.current / self.target
    }
}

/// Live state of a loop-termination predicate.
///
/// One variant per predicate kind; an instance lives for a single
/// `set_speed_while` invocation. The engine calls [`update`] once per tick
/// with the drive state and the distance driven since the motion began,
/// then consults [`is_loop_running`]; lerp-style speed functions read
/// [`progress`].
///
/// [`update`]: ConditionalResult::update
/// [`is_loop_running`]: ConditionalResult::is_loop_running
/// [`progress`]: ConditionalResult::progress
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalResult {
    /// Free-form predicate with no measurable progress.
    Undefined { condition_met: bool },
    /// Elapsed wall time against a target in milliseconds.
    Timed(Progress),
    /// Euclidean driven distance against a target in metres.
    Distance(Progress),
    /// Forward component of the driven distance (omni bases).
    ForwardDistance(Progress),
    /// Strafe component of the driven distance (omni bases).
    SideDistance(Progress),
    /// Heading against a rotation target in radians; writes the target
    /// into the drive state every tick.
    Rotation(Progress),
    /// Encoder-tick goal consumed by the motor primitives, which bypass
    /// the velocity loop and issue absolute position commands.
    MotorTicks(Progress),
}

impl ConditionalResult {
    /// Fold the current tick's measurements into the predicate.
    ///
    /// `driven` is the (forward, strafe) distance in metres accumulated
    /// since the motion started.
    pub fn update(&mut self, state: &mut DriveState, driven: (f32, f32)) {
        match self {
            ConditionalResult::Undefined { .. }
            | ConditionalResult::Timed(_)
            | ConditionalResult::MotorTicks(_) => {}
            ConditionalResult::Distance(progress) => {
                let (dx, dy) = driven;
                update_distance(progress, (dx * dx + dy * dy).sqrt());
            }
            ConditionalResult::ForwardDistance(progress) => update_distance(progress, driven.0),
            ConditionalResult::SideDistance(progress) => update_distance(progress, driven.1),
            ConditionalResult::Rotation(progress) => {
                state.desired_heading = progress.target;
                progress.current = state.current_heading;
                // 0.01 rad ~= 0.5 deg
                progress.running =
                    progress.current.abs() <= state.desired_heading.abs() - 0.01;
            }
        }
    }

    /// Fraction of the target reached; zero for undefined predicates.
    pub fn progress(&self) -> f32 {
        match self {
            ConditionalResult::Undefined { .. } => 0.0,
            ConditionalResult::Timed(p)
            | ConditionalResult::Distance(p)
            | ConditionalResult::ForwardDistance(p)
            | ConditionalResult::SideDistance(p)
            | ConditionalResult::Rotation(p)
            | ConditionalResult::MotorTicks(p) => p.fraction(),
        }
    }

    /// Whether the engine should run another tick.
    pub fn is_loop_running(&self) -> bool {
        match self {
            ConditionalResult::Undefined { condition_met } => *condition_met,
            ConditionalResult::Timed(p) => p.current < p.target,
            ConditionalResult::Distance(p)
            | ConditionalResult::ForwardDistance(p)
            | ConditionalResult::SideDistance(p)
            | ConditionalResult::Rotation(p)
            | ConditionalResult::MotorTicks(p) => p.running,
        }
    }

    /// Target value, if the variant has one.
    pub fn target(&self) -> Option<f32> {
        match self {
            ConditionalResult::Undefined { .. } => None,
            ConditionalResult::Timed(p)
            | ConditionalResult::Distance(p)
            | ConditionalResult::ForwardDistance(p)
            | ConditionalResult::SideDistance(p)
            | ConditionalResult::Rotation(p)
            | ConditionalResult::MotorTicks(p) => Some(p.target),
        }
    }
}

fn update_distance(progress: &mut Progress, distance: f32) {
    progress.current = distance;
    progress.running = distance.abs() <= progress.target;
}

impl fmt::Display for ConditionalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionalResult::Undefined { condition_met } => {
                write!(f, "undefined: condition_met={condition_met}")
            }
            ConditionalResult::Timed(p) => {
                write!(
                    f,
                    "timed: {:.0}/{:.0} ms, running={}",
                    p.current,
                    p.target,
                    self.is_loop_running()
                )
            }
            ConditionalResult::Distance(p) => {
                write!(f, "distance: {:.3}/{:.3} m, running={}", p.current, p.target, p.running)
            }
            ConditionalResult::ForwardDistance(p) => {
                write!(
                    f,
                    "forward distance: {:.3}/{:.3} m, running={}",
                    p.current, p.target, p.running
                )
            }
            ConditionalResult::SideDistance(p) => {
                write!(
                    f,
                    "side distance: {:.3}/{:.3} m, running={}",
                    p.current, p.target, p.running
                )
            }
            ConditionalResult::Rotation(p) => {
                write!(
                    f,
                    "rotation: {:.1}°/{:.1}°, running={}",
                    p.current.to_degrees(),
                    p.target.to_degrees(),
                    p.running
                )
            }
            ConditionalResult::MotorTicks(p) => {
                write!(
                    f,
                    "motor ticks: {:.0}/{:.0}, running={}",
                    p.current, p.target, p.running
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_runs_until_target() {
        let mut state = DriveState::default();
        let mut result = ConditionalResult::Distance(Progress::new(0.5));

        result.update(&mut state, (0.3, 0.0));
        assert!(result.is_loop_running());

        // 0.3 forward, 0.4 sideways: hypotenuse exactly on target.
        result.update(&mut state, (0.3, 0.4));
        assert!(result.is_loop_running());

        result.update(&mut state, (0.4, 0.4));
        assert!(!result.is_loop_running());
    }

    #[test]
    fn test_rotation_writes_desired_heading_and_terminates() {
        let mut state = DriveState::default();
        let target = 90.0_f32.to_radians();
        let mut result = ConditionalResult::Rotation(Progress::new(target));

        state.current_heading = 0.0;
        result.update(&mut state, (0.0, 0.0));
        assert_eq!(state.desired_heading, target);
        assert!(result.is_loop_running());

        state.current_heading = target - 0.005;
        result.update(&mut state, (0.0, 0.0));
        assert!(!result.is_loop_running());
    }

    #[test]
    fn test_side_distance_uses_strafe_component() {
        let mut state = DriveState::default();
        let mut result = ConditionalResult::SideDistance(Progress::new(0.2));

        result.update(&mut state, (5.0, 0.1));
        assert!(result.is_loop_running());

        result.update(&mut state, (5.0, 0.25));
        assert!(!result.is_loop_running());
    }

    #[test]
    fn test_progress_fraction() {
        let mut progress = Progress::new(2.0);
        progress.current = 0.5;
        let result = ConditionalResult::Distance(progress);
        assert_eq!(result.progress(), 0.25);
    }

    #[test]
    fn test_undefined_has_zero_progress() {
        let result = ConditionalResult::Undefined {
            condition_met: true,
        };
        assert_eq!(result.progress(), 0.0);
        assert!(result.is_loop_running());
    }
}
