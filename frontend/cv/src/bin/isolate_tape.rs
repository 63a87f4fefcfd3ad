use anyhow::Context;
use cv::lane_follower::{annotate, track_lane};
use cv::DrivePolicy;

/// Runs the tape pipeline over a saved frame, for tuning away from the simulator.
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args.next().context("usage: isolate_tape <frame.png> [annotated.png]")?;
    let output = args.next().unwrap_or_else(|| "annotated.png".to_owned());

    let image = image::open(&input)
        .with_context(|| format!("Could not read {}", input))?
        .to_rgb8();
    let (width, height) = image.dimensions();

    let lane = track_lane(&image);

    println!("yellow contours: {}", lane.yellow.contours.len());
    println!("blue contours: {}", lane.blue.contours.len());
    println!("{}", lane.sighting);

    let command = DrivePolicy::default().command(lane.sighting, width, height);
    println!("steer: {:.1} deg, speed: {}", command.steer_degrees(), command.motor_velocity);

    annotate(&image, &lane)
        .save(&output)
        .with_context(|| format!("Could not write {}", output))?;
    println!("Wrote {}", output);

    Ok(())
}
