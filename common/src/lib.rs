#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod controller;
pub mod sensor;

pub const REMOTE_API_HOST: &str = "127.0.0.1";
pub const REMOTE_API_PORT: u16 = 23000;
pub const CONNECT_TIMEOUT_MS: u64 = 5000;

pub const LEFT_CAMERA: &str = "/Camera_Left";
pub const RIGHT_CAMERA: &str = "/Camera_Right";
pub const STEER_JOINT: &str = "/steer_joint";
pub const MOTOR_JOINT: &str = "/motor_joint";
