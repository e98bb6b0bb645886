use serde::{Deserialize, Serialize};

/// IMU axis selector (NED: x forward, y right, z down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Mounting direction of the drive base relative to the robot's notion of
/// "forward". `Backward` flips the heading convention used by the heading
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// +1 for `Forward`, -1 for `Backward`.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}
