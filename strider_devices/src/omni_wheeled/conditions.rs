//! Conditionals only a holonomic base can answer: distance along a single
//! body axis instead of the Euclidean path length.

use strider_core::datatype::{ConditionalFunction, ConditionalResult, Progress};

/// Run until the forward component of the driven distance reaches
/// `distance_cm`.
pub fn for_forward_distance(distance_cm: f32) -> ConditionalFunction<'static> {
    Box::new(move |_| ConditionalResult::ForwardDistance(Progress::new(distance_cm / 100.0)))
}

/// Run until the strafe component of the driven distance reaches
/// `distance_cm`.
pub fn for_side_distance(distance_cm: f32) -> ConditionalFunction<'static> {
    Box::new(move |_| ConditionalResult::SideDistance(Progress::new(distance_cm / 100.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_core::motion::DriveState;

    #[test]
    fn test_forward_distance_ignores_strafe() {
        let mut state = DriveState::default();
        let mut condition = for_forward_distance(20.0);
        let mut result = condition(false);

        result.update(&mut state, (0.1, 5.0));
        assert!(result.is_loop_running());

        result.update(&mut state, (0.25, 5.0));
        assert!(!result.is_loop_running());
    }

    #[test]
    fn test_side_distance_tracks_strafe() {
        let mut state = DriveState::default();
        let mut condition = for_side_distance(30.0);
        let mut result = condition(false);

        result.update(&mut state, (9.0, 0.2));
        assert!(result.is_loop_running());

        result.update(&mut state, (9.0, 0.31));
        assert!(!result.is_loop_running());
    }

    #[test]
    fn test_type_check_dispatch() {
        let mut condition = for_side_distance(10.0);
        let result = condition(true);
        assert!(matches!(result, ConditionalResult::SideDistance(_)));
        assert_eq!(result.progress(), 0.0);
    }
}
