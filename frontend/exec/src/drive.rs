use std::sync::atomic::{AtomicBool, Ordering};
use anyhow::Context;
use tracing::{debug, info, warn};
use common::controller::DriveCommand;
use cv::{FrameHandler, LaneFollower, LaneSighting};
use remote_api::{ObjectHandle, Simulator};
use crate::config::{Config, SceneConfig};
use crate::frame_dump::FrameDumper;

pub struct Handles {
    pub left_camera: ObjectHandle,
    pub right_camera: ObjectHandle,
    pub steer_joint: ObjectHandle,
    pub motor_joint: ObjectHandle,
}

impl Handles {
    pub fn resolve<S: Simulator>(sim: &mut S, scene: &SceneConfig) -> anyhow::Result<Self> {
        let mut get = |path: &str| sim.get_object(path)
            .with_context(|| format!("Could not find {} in the scene", path));

        Ok(Self {
            left_camera: get(&scene.left_camera)?,
            right_camera: get(&scene.right_camera)?,
            steer_joint: get(&scene.steer_joint)?,
            motor_joint: get(&scene.motor_joint)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DriveState {
    pub steps: u64,
    pub skipped_frames: u64,
    pub both_tapes: u64,
    pub one_tape: u64,
    pub no_tape: u64,
    pub last_command: Option<DriveCommand>,
}

impl DriveState {
    fn record(&mut self, sighting: Option<LaneSighting>, command: DriveCommand) {
        match sighting {
            Some(LaneSighting::Both { .. }) => self.both_tapes += 1,
            Some(LaneSighting::YellowOnly(_)) | Some(LaneSighting::BlueOnly(_)) => self.one_tape += 1,
            Some(LaneSighting::Neither) | None => self.no_tape += 1,
        }
        self.last_command = Some(command);
    }
}

/// Starts the simulation, drives until `stop` is set or the step budget is
/// spent, and stops the simulation again whatever happened in between.
pub fn run<S: Simulator>(sim: &mut S, config: &Config, stop: &AtomicBool) -> anyhow::Result<DriveState> {
    sim.set_stepping(true).context("Could not enable stepping")?;
    sim.start_simulation().context("Could not start the simulation")?;

    let result = Handles::resolve(sim, &config.scene)
        .and_then(|handles| drive(sim, &handles, config, stop));

    if let Err(err) = sim.stop_simulation() {
        warn!("Could not stop the simulation: {}", err);
    }

    let state = result?;
    info!(
        "Drove {} steps: both tapes {}, one tape {}, no tape {}, skipped {}",
        state.steps, state.both_tapes, state.one_tape, state.no_tape, state.skipped_frames
    );
    if let Some(command) = state.last_command {
        debug!("Last command: {:?}", command);
    }

    Ok(state)
}

fn drive<S: Simulator>(sim: &mut S, handles: &Handles, config: &Config, stop: &AtomicBool) -> anyhow::Result<DriveState> {
    let mut dumper = config.run.dump_dir.as_deref()
        .map(FrameDumper::spawn)
        .transpose()?;
    let mut follower = LaneFollower::new(config.drive.clone())
        .with_annotations(dumper.is_some());
    let max_steps = config.max_steps();

    let mut state = DriveState::default();

    while !stop.load(Ordering::Acquire) && max_steps.map_or(true, |max| state.steps < max) {
        let step = state.steps;
        state.steps += 1;

        sim.step().context("Step failed")?;

        let left = sim.get_vision_sensor_image(handles.left_camera).context("Could not read left camera")?;
        let right = sim.get_vision_sensor_image(handles.right_camera).context("Could not read right camera")?;

        let frame = match cv::frame::stitch(&left, &right) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Skipping step {}: {:#}", step, err);
                state.skipped_frames += 1;
                continue;
            }
        };

        let (command, message) = match follower.handle_frame(&frame) {
            Ok(result) => result,
            Err(err) => {
                warn!("Skipping step {}: {:#}", step, err);
                state.skipped_frames += 1;
                continue;
            }
        };

        sim.set_joint_target_velocity(handles.motor_joint, f64::from(command.motor_velocity))
            .context("Could not set motor velocity")?;
        sim.set_joint_target_position(handles.steer_joint, f64::from(command.steer_angle))
            .context("Could not set steering")?;

        debug!(
            "step {}: {}, steer {:.1} deg, speed {}",
            step, message, command.steer_degrees(), command.motor_velocity
        );

        if let Some(dumper) = &mut dumper {
            if let Some(debug_frame) = follower.take_debug_frame() {
                dumper.offer(step, debug_frame);
            }
        }

        state.record(follower.last_sighting(), command);
    }

    Ok(state)
}
