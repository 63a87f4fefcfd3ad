use serde::{Serialize, Deserialize};

/// What the car is told to do for one simulation step.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    /// Target velocity of the drive motor joint
    pub motor_velocity: f32,
    /// Target position of the steering joint in radians, positive is left
    pub steer_angle: f32,
}

impl DriveCommand {
    pub fn steer_degrees(&self) -> f32 {
        self.steer_angle.to_degrees()
    }
}
