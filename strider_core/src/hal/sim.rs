//! Software peripheral bus.
//!
//! `SimBus` stands in for the robot controller when no hardware is present:
//! commanded motor velocities are integrated into encoder positions in real
//! time, position goals complete like the firmware's `move_to_position`, and
//! the simulated gyro can be slaved to a differential-drive geometry so
//! closed-loop heading tests converge. Sensor values are plain setters.

use std::time::Instant;

use nalgebra::Vector3;
use parking_lot::Mutex;

use super::{ImuBus, MotorBus, SensorBus, ServoBus};

pub const SIM_MOTOR_PORTS: usize = 4;
pub const SIM_SENSOR_PORTS: usize = 8;
pub const SIM_SERVO_PORTS: usize = 4;

/// Differential-drive geometry used to derive the simulated yaw rate from
/// the commanded wheel velocities.
#[derive(Debug, Clone, Copy)]
pub struct DiffDriveGeometry {
    pub left_port: u8,
    pub right_port: u8,
    pub ticks_per_revolution: f64,
    pub wheel_radius: f64,
    pub wheel_base: f64,
}

#[derive(Debug, Clone, Copy)]
struct MotorGoal {
    target: f64,
    velocity: f64,
}

#[derive(Debug, Clone, Copy)]
struct SimMotor {
    velocity: f64,
    position: f64,
    goal: Option<MotorGoal>,
    done: bool,
}

impl SimMotor {
    const fn new() -> Self {
        Self {
            velocity: 0.0,
            position: 0.0,
            goal: None,
            done: true,
        }
    }
}

struct SimState {
    motors: [SimMotor; SIM_MOTOR_PORTS],
    servos: [u16; SIM_SERVO_PORTS],
    servos_enabled: [bool; SIM_SERVO_PORTS],
    analog: [i32; SIM_SENSOR_PORTS],
    digital: [bool; SIM_SENSOR_PORTS],
    button: bool,
    accel: Vector3<f64>,
    gyro: Vector3<f64>,
    magneto: Vector3<f64>,
    diff_geometry: Option<DiffDriveGeometry>,
    last_advance: Instant,
}

/// In-process peripheral bus for tests and dry runs.
pub struct SimBus {
    state: Mutex<SimState>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                motors: [SimMotor::new(); SIM_MOTOR_PORTS],
                servos: [1024; SIM_SERVO_PORTS],
                servos_enabled: [false; SIM_SERVO_PORTS],
                analog: [0; SIM_SENSOR_PORTS],
                digital: [false; SIM_SENSOR_PORTS],
                button: false,
                // Resting flat: gravity along +z (NED), field along +x.
                accel: Vector3::new(0.0, 0.0, 9.81),
                gyro: Vector3::zeros(),
                magneto: Vector3::new(30.0, 0.0, 0.0),
                diff_geometry: None,
                last_advance: Instant::now(),
            }),
        }
    }

    /// Derive the simulated z gyro from the two wheel commands of a
    /// differential drive instead of the static value.
    pub fn track_differential_drive(&self, geometry: DiffDriveGeometry) {
        self.state.lock().diff_geometry = Some(geometry);
    }

    pub fn set_analog(&self, port: u8, value: i32) {
        self.state.lock().analog[port as usize] = value;
    }

    pub fn set_digital(&self, port: u8, value: bool) {
        self.state.lock().digital[port as usize] = value;
    }

    pub fn set_button(&self, pressed: bool) {
        self.state.lock().button = pressed;
    }

    pub fn set_accel(&self, accel: Vector3<f64>) {
        self.state.lock().accel = accel;
    }

    pub fn set_gyro(&self, gyro: Vector3<f64>) {
        self.state.lock().gyro = gyro;
    }

    pub fn set_magneto(&self, magneto: Vector3<f64>) {
        self.state.lock().magneto = magneto;
    }

    /// Force an encoder position, e.g. to script a calibration run.
    pub fn set_motor_position(&self, port: u8, ticks: i32) {
        let mut state = self.state.lock();
        advance(&mut state);
        state.motors[port as usize].position = ticks as f64;
    }

    /// Last velocity commanded on a port, in ticks/s.
    pub fn commanded_velocity(&self, port: u8) -> f64 {
        self.state.lock().motors[port as usize].velocity
    }

    pub fn servo_position(&self, port: u8) -> u16 {
        self.state.lock().servos[port as usize]
    }

    pub fn servo_enabled(&self, port: u8) -> bool {
        self.state.lock().servos_enabled[port as usize]
    }
}

/// Integrate motor state over the wall-clock time since the last call.
fn advance(state: &mut SimState) {
    let now = Instant::now();
    let dt = now.duration_since(state.last_advance).as_secs_f64();
    state.last_advance = now;
    if dt <= 0.0 {
        return;
    }

    for motor in &mut state.motors {
        if let Some(goal) = motor.goal {
            let step = goal.velocity.abs() * dt;
            let remaining = goal.target - motor.position;
            if remaining.abs() <= step {
                motor.position = goal.target;
                motor.goal = None;
                motor.done = true;
            } else {
                motor.position += step * remaining.signum();
            }
        } else {
            motor.position += motor.velocity * dt;
        }
    }

    if let Some(geometry) = state.diff_geometry {
        let tick_to_ms =
            2.0 * std::f64::consts::PI * geometry.wheel_radius / geometry.ticks_per_revolution;
        let v_left = state.motors[geometry.left_port as usize].velocity * tick_to_ms;
        let v_right = state.motors[geometry.right_port as usize].velocity * tick_to_ms;
        let omega = (v_right - v_left) / geometry.wheel_base;
        state.gyro[2] = omega.to_degrees();
    }
}

impl MotorBus for SimBus {
    fn set_motor_velocity(&self, port: u8, ticks_per_s: i32) {
        let mut state = self.state.lock();
        advance(&mut state);
        let motor = &mut state.motors[port as usize];
        motor.velocity = ticks_per_s as f64;
        motor.goal = None;
    }

    fn move_to_position(&self, port: u8, velocity: i32, target_ticks: i32) {
        let mut state = self.state.lock();
        advance(&mut state);
        let motor = &mut state.motors[port as usize];
        // Re-issuing the same goal must not reset completion.
        if motor.done && (motor.position - target_ticks as f64).abs() < 1.0 {
            return;
        }
        motor.goal = Some(MotorGoal {
            target: target_ticks as f64,
            velocity: velocity as f64,
        });
        motor.velocity = 0.0;
        motor.done = false;
    }

    fn motor_position(&self, port: u8) -> i32 {
        let mut state = self.state.lock();
        advance(&mut state);
        state.motors[port as usize].position.round() as i32
    }

    fn clear_motor_position(&self, port: u8) {
        let mut state = self.state.lock();
        advance(&mut state);
        state.motors[port as usize].position = 0.0;
    }

    fn motor_done(&self, port: u8) -> bool {
        let mut state = self.state.lock();
        advance(&mut state);
        state.motors[port as usize].done
    }

    fn freeze(&self, port: u8) {
        let mut state = self.state.lock();
        advance(&mut state);
        let motor = &mut state.motors[port as usize];
        motor.velocity = 0.0;
        motor.goal = None;
    }

    fn all_off(&self) {
        let mut state = self.state.lock();
        advance(&mut state);
        for motor in &mut state.motors {
            motor.velocity = 0.0;
            motor.goal = None;
        }
    }
}

impl ServoBus for SimBus {
    fn set_servo_position(&self, port: u8, position: u16) {
        self.state.lock().servos[port as usize] = position;
    }

    fn enable_servo(&self, port: u8) {
        self.state.lock().servos_enabled[port as usize] = true;
    }

    fn disable_servo(&self, port: u8) {
        self.state.lock().servos_enabled[port as usize] = false;
    }

    fn disable_servos(&self) {
        self.state.lock().servos_enabled = [false; SIM_SERVO_PORTS];
    }
}

impl SensorBus for SimBus {
    fn analog(&self, port: u8) -> i32 {
        self.state.lock().analog[port as usize]
    }

    fn digital(&self, port: u8) -> bool {
        self.state.lock().digital[port as usize]
    }

    fn any_button(&self) -> bool {
        self.state.lock().button
    }
}

impl ImuBus for SimBus {
    fn accel(&self) -> Vector3<f64> {
        self.state.lock().accel
    }

    fn gyro(&self) -> Vector3<f64> {
        let mut state = self.state.lock();
        advance(&mut state);
        state.gyro
    }

    fn magneto(&self) -> Vector3<f64> {
        self.state.lock().magneto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_velocity_integrates_into_position() {
        let bus = SimBus::new();
        bus.set_motor_velocity(0, 1000);
        sleep(Duration::from_millis(50));
        let position = bus.motor_position(0);
        assert!((30..=90).contains(&position), "position = {position}");
    }

    #[test]
    fn test_position_goal_completes_and_sets_done() {
        let bus = SimBus::new();
        bus.move_to_position(1, 1000, 40);
        assert!(!bus.motor_done(1));
        sleep(Duration::from_millis(80));
        assert!(bus.motor_done(1));
        assert_eq!(bus.motor_position(1), 40);
    }

    #[test]
    fn test_tracked_gyro_follows_wheel_commands() {
        let bus = SimBus::new();
        bus.track_differential_drive(DiffDriveGeometry {
            left_port: 0,
            right_port: 1,
            ticks_per_revolution: 1582.0,
            wheel_radius: 0.035,
            wheel_base: 0.18,
        });
        bus.set_motor_velocity(0, -500);
        bus.set_motor_velocity(1, 500);
        let gyro = bus.gyro();
        // Right wheel forward, left wheel back: pure rotation, nonzero z rate.
        assert!(gyro[2].abs() > 1.0);
    }
}
