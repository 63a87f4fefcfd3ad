pub mod client;
pub mod codec;
pub mod error;
pub mod transport;

use common::sensor::SensorImage;

pub use client::RemoteApi;
pub use error::{RemoteApiError, Result};
pub use transport::{Transport, ZmqTransport};

/// Handle of a scene object, as handed out by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub i64);

/// The slice of the simulator's API the car needs.
pub trait Simulator {
    /// Synchronous mode: the simulation only advances on [`Simulator::step`].
    fn set_stepping(&mut self, enabled: bool) -> Result<()>;
    fn step(&mut self) -> Result<()>;

    fn start_simulation(&mut self) -> Result<()>;
    fn stop_simulation(&mut self) -> Result<()>;

    fn get_object(&mut self, path: &str) -> Result<ObjectHandle>;
    fn get_vision_sensor_image(&mut self, sensor: ObjectHandle) -> Result<SensorImage>;

    fn set_joint_target_velocity(&mut self, joint: ObjectHandle, velocity: f64) -> Result<()>;
    fn set_joint_target_position(&mut self, joint: ObjectHandle, position: f64) -> Result<()>;
}
