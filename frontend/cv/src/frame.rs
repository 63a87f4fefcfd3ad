use anyhow::{bail, Context};
use image::{imageops, RgbImage};
use common::sensor::SensorImage;

/// Rows from here down show the car's own bonnet.
const VEHICLE_TOP: u32 = 200;
const VEHICLE_LEFT: u32 = 68;
const VEHICLE_RIGHT: u32 = 608;

pub fn decode(image: &SensorImage) -> anyhow::Result<RgbImage> {
    let buffer = RgbImage::from_raw(image.width, image.height, image.data.clone())
        .with_context(|| format!(
            "{} bytes do not make a {}x{} rgb image",
            image.data.len(), image.width, image.height
        ))?;

    // sensors deliver the bottom row first
    Ok(imageops::flip_vertical(&buffer))
}

/// Places the left and right camera images side by side.
pub fn stitch(left: &SensorImage, right: &SensorImage) -> anyhow::Result<RgbImage> {
    let left = decode(left).context("Left camera")?;
    let right = decode(right).context("Right camera")?;

    if left.height() != right.height() {
        bail!("Camera heights differ: {} vs {}", left.height(), right.height());
    }

    let mut frame = RgbImage::new(left.width() + right.width(), left.height());
    imageops::replace(&mut frame, &left, 0, 0);
    imageops::replace(&mut frame, &right, left.width() as i64, 0);

    Ok(frame)
}

/// Blanks the part of the stitched frame that shows the car itself.
pub fn apply_roi(frame: &mut RgbImage) {
    let right = VEHICLE_RIGHT.min(frame.width());

    for y in VEHICLE_TOP..frame.height() {
        for x in VEHICLE_LEFT..right {
            frame.put_pixel(x, y, image::Rgb([0, 0, 0]));
        }
    }
}
