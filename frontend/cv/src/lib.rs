pub mod frame;
pub mod lane_follower;
pub mod tape;

use image::RgbImage;
use common::controller::DriveCommand;

pub use lane_follower::{DrivePolicy, LaneFollower, LaneSighting};

pub trait FrameHandler {
    /// Turns one camera frame into a command and a short status message.
    fn handle_frame(&mut self, frame: &RgbImage) -> anyhow::Result<(DriveCommand, String)>;
}
