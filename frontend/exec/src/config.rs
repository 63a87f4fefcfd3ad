use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use cv::DrivePolicy;

#[derive(Parser, Debug, Default)]
#[command(name = "lane-follower", version, about = "Drives the simulated car between the yellow and blue tape")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Remote API host
    #[arg(long)]
    pub host: Option<String>,

    /// Remote API port
    #[arg(long)]
    pub port: Option<u16>,

    /// Stop after this many simulation steps
    #[arg(long)]
    pub steps: Option<u64>,

    /// Write annotated frames into this directory
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub scene: SceneConfig,
    pub drive: DrivePolicy,
    pub run: RunConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: common::REMOTE_API_HOST.to_owned(),
            port: common::REMOTE_API_PORT,
            timeout_ms: common::CONNECT_TIMEOUT_MS,
        }
    }
}

/// Paths of the scene objects the car is made of.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SceneConfig {
    pub left_camera: String,
    pub right_camera: String,
    pub steer_joint: String,
    pub motor_joint: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            left_camera: common::LEFT_CAMERA.to_owned(),
            right_camera: common::RIGHT_CAMERA.to_owned(),
            steer_joint: common::STEER_JOINT.to_owned(),
            motor_joint: common::MOTOR_JOINT.to_owned(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RunConfig {
    /// 0 runs until interrupted
    pub max_steps: u64,
    pub dump_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;

        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.connection.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.connection.port = port;
        }
        if let Some(steps) = cli.steps {
            self.run.max_steps = steps;
        }
        if let Some(dump_dir) = &cli.dump_dir {
            self.run.dump_dir = Some(dump_dir.clone());
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.connection.timeout_ms)
    }

    pub fn max_steps(&self) -> Option<u64> {
        (self.run.max_steps > 0).then_some(self.run.max_steps)
    }
}
