use std::fmt::{Display, Formatter};
use anyhow::bail;
use glam::{DVec2, IVec2};
use image::{imageops, Rgb, RgbImage};
use imageproc::contours::find_contours;
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::point::Point;
use serde::Deserialize;
use tracing::debug;
use common::controller::DriveCommand;
use crate::tape::{self, TapeMasks};
use crate::FrameHandler;

/// Anything this small is sensor noise.
const MIN_CONTOUR_AREA: f64 = 10.0;

const CONTOUR_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
const CENTROID_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);
const MIDPOINT_COLOUR: Rgb<u8> = Rgb([0, 255, 255]);
const CENTRE_LINE_COLOUR: Rgb<u8> = Rgb([255, 255, 255]);
const LINE_THICKNESS: i32 = 3;

type Contour = Vec<Point<i32>>;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrivePolicy {
    pub cruise_speed: f32,
    pub turn_speed: f32,
    /// Degrees of steering above which the car slows to `turn_speed`
    pub slow_down_angle: f32,
    /// Degrees to steer when only one tape is visible
    pub search_angle: f32,
    /// Blank out the car's bonnet before looking for tape
    pub mask_vehicle: bool,
}

impl Default for DrivePolicy {
    fn default() -> Self {
        Self {
            cruise_speed: 200.0,
            turn_speed: 10.0,
            slow_down_angle: 15.0,
            search_angle: 30.0,
            mask_vehicle: false,
        }
    }
}

impl DrivePolicy {
    /// Steering angle in radians, positive is left.
    pub fn steer_angle(&self, sighting: LaneSighting, width: u32, height: u32) -> f64 {
        match sighting {
            LaneSighting::Both { midpoint, .. } => steer_towards(midpoint, width, height),
            LaneSighting::BlueOnly(_) => f64::from(self.search_angle).to_radians(),
            LaneSighting::YellowOnly(_) => -f64::from(self.search_angle).to_radians(),
            LaneSighting::Neither => 0.0,
        }
    }

    pub fn speed(&self, steer_angle: f64) -> f32 {
        if steer_angle.to_degrees().abs() > f64::from(self.slow_down_angle) {
            self.turn_speed
        } else {
            self.cruise_speed
        }
    }

    pub fn command(&self, sighting: LaneSighting, width: u32, height: u32) -> DriveCommand {
        let steer_angle = self.steer_angle(sighting, width, height);

        DriveCommand {
            motor_velocity: self.speed(steer_angle),
            steer_angle: steer_angle as f32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneSighting {
    Both { yellow: IVec2, blue: IVec2, midpoint: IVec2 },
    YellowOnly(IVec2),
    BlueOnly(IVec2),
    Neither,
}

impl LaneSighting {
    pub fn from_centroids(yellow: Option<IVec2>, blue: Option<IVec2>) -> Self {
        match (yellow, blue) {
            (Some(yellow), Some(blue)) => LaneSighting::Both { yellow, blue, midpoint: midpoint(yellow, blue) },
            (Some(yellow), None) => LaneSighting::YellowOnly(yellow),
            (None, Some(blue)) => LaneSighting::BlueOnly(blue),
            (None, None) => LaneSighting::Neither,
        }
    }
}

impl Display for LaneSighting {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LaneSighting::Both { midpoint, .. } => write!(f, "Following lane centre at ({}, {})", midpoint.x, midpoint.y),
            LaneSighting::YellowOnly(_) => write!(f, "Only yellow tape in sight"),
            LaneSighting::BlueOnly(_) => write!(f, "Only blue tape in sight"),
            LaneSighting::Neither => write!(f, "No tape in sight"),
        }
    }
}

/// Zeroth and first order moments of a polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    pub fn area(&self) -> f64 {
        self.m00.abs()
    }

    /// Truncated centre of mass, `None` for degenerate polygons.
    pub fn centroid(&self) -> Option<IVec2> {
        if self.m00 == 0.0 {
            return None;
        }

        let centre = DVec2::new(self.m10 / self.m00, self.m01 / self.m00);
        Some(centre.as_ivec2())
    }
}

/// Polygon moments by Green's theorem; the orientation of the contour does not matter.
pub fn moments(contour: &[Point<i32>]) -> Moments {
    let mut moments = Moments::default();

    let Some(last) = contour.last() else {
        return moments;
    };

    let mut previous = DVec2::new(last.x as f64, last.y as f64);
    for point in contour {
        let current = DVec2::new(point.x as f64, point.y as f64);
        let cross = previous.x * current.y - current.x * previous.y;

        moments.m00 += cross;
        moments.m10 += cross * (previous.x + current.x);
        moments.m01 += cross * (previous.y + current.y);

        previous = current;
    }

    moments.m00 /= 2.0;
    moments.m10 /= 6.0;
    moments.m01 /= 6.0;

    if moments.m00 < 0.0 {
        moments.m00 = -moments.m00;
        moments.m10 = -moments.m10;
        moments.m01 = -moments.m01;
    }

    moments
}

pub fn midpoint(a: IVec2, b: IVec2) -> IVec2 {
    let mid = a.as_dvec2() / 2.0 + b.as_dvec2() / 2.0;
    mid.as_ivec2()
}

/// Angle to steer so the car heads for `target`, measured from the bottom centre of the frame.
pub fn steer_towards(target: IVec2, width: u32, height: u32) -> f64 {
    let offset = target.x as f64 - width as f64 / 2.0;
    let far = height as f64 - target.y as f64;

    f64::atan2(-offset, far)
}

/// Contours of one tape colour, largest first.
#[derive(Debug, Default, Clone)]
pub struct Tape {
    pub contours: Vec<Contour>,
    pub centroids: Vec<IVec2>,
}

impl Tape {
    pub fn find(mask: &image::GrayImage) -> Self {
        let mut contours: Vec<(Contour, Moments)> = find_contours::<i32>(mask)
            .into_iter()
            .map(|contour| {
                let moments = moments(&contour.points);
                (contour.points, moments)
            })
            .filter(|(_, moments)| moments.area() > MIN_CONTOUR_AREA)
            .collect();

        contours.sort_by(|(_, a), (_, b)| f64::total_cmp(&b.area(), &a.area()));

        let centroids = contours.iter()
            .filter_map(|(_, moments)| moments.centroid())
            .collect();
        let contours = contours.into_iter()
            .map(|(contour, _)| contour)
            .collect();

        Tape { contours, centroids }
    }

    pub fn centroid(&self) -> Option<IVec2> {
        self.centroids.first().copied()
    }
}

/// Everything learned from one frame.
pub struct LaneFrame {
    pub masks: TapeMasks,
    pub yellow: Tape,
    pub blue: Tape,
    pub sighting: LaneSighting,
}

pub fn track_lane(frame: &RgbImage) -> LaneFrame {
    let masks = tape::isolate_tape(frame);
    let yellow = Tape::find(&masks.yellow);
    let blue = Tape::find(&masks.blue);

    if yellow.centroid().is_none() {
        debug!("Yellow tape not found, contours: {}, centroids: {}", yellow.contours.len(), yellow.centroids.len());
    }
    if blue.centroid().is_none() {
        debug!("Blue tape not found, contours: {}, centroids: {}", blue.contours.len(), blue.centroids.len());
    }

    let sighting = LaneSighting::from_centroids(yellow.centroid(), blue.centroid());

    LaneFrame { masks, yellow, blue, sighting }
}

/// The camera frame on top, the filtered frame with the detections drawn on below.
pub fn annotate(frame: &RgbImage, lane: &LaneFrame) -> RgbImage {
    let (width, height) = frame.dimensions();
    let mut processed = lane.masks.filtered.clone();

    for tape in [&lane.yellow, &lane.blue] {
        for contour in &tape.contours {
            draw_contour(&mut processed, contour);
        }
        for centroid in &tape.centroids {
            draw_ring(&mut processed, *centroid, 3, CENTROID_COLOUR);
        }
    }

    if let LaneSighting::Both { midpoint, .. } = lane.sighting {
        draw_ring(&mut processed, midpoint, 5, MIDPOINT_COLOUR);
    }

    let centre = (width / 2) as f32;
    draw_line_segment_mut(&mut processed, (centre, 0.0), (centre, height as f32), CENTRE_LINE_COLOUR);

    let mut composite = RgbImage::new(width, height * 2);
    imageops::replace(&mut composite, frame, 0, 0);
    imageops::replace(&mut composite, &processed, 0, height as i64);

    composite
}

fn draw_contour(image: &mut RgbImage, contour: &[Point<i32>]) {
    let Some(last) = contour.last() else {
        return;
    };

    let half = LINE_THICKNESS / 2;
    let mut previous = last;
    for point in contour {
        for dy in -half..=half {
            for dx in -half..=half {
                draw_line_segment_mut(
                    image,
                    ((previous.x + dx) as f32, (previous.y + dy) as f32),
                    ((point.x + dx) as f32, (point.y + dy) as f32),
                    CONTOUR_COLOUR,
                );
            }
        }
        previous = point;
    }
}

fn draw_ring(image: &mut RgbImage, centre: IVec2, radius: i32, colour: Rgb<u8>) {
    let half = LINE_THICKNESS / 2;
    for radius in radius - half..=radius + half {
        draw_hollow_circle_mut(image, (centre.x, centre.y), radius, colour);
    }
}

/// Steers between the yellow and the blue tape.
#[derive(Clone, Debug, Default)]
pub struct LaneFollower {
    policy: DrivePolicy,
    annotate: bool,
    last_sighting: Option<LaneSighting>,
    debug_frame: Option<RgbImage>,
}

impl LaneFollower {
    pub fn new(policy: DrivePolicy) -> Self {
        Self { policy, ..Default::default() }
    }

    /// Keep an annotated copy of every frame, see [`LaneFollower::take_debug_frame`].
    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    pub fn last_sighting(&self) -> Option<LaneSighting> {
        self.last_sighting
    }

    pub fn take_debug_frame(&mut self) -> Option<RgbImage> {
        self.debug_frame.take()
    }
}

impl FrameHandler for LaneFollower {
    fn handle_frame(&mut self, frame: &RgbImage) -> anyhow::Result<(DriveCommand, String)> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            bail!("Empty frame");
        }

        let lane = if self.policy.mask_vehicle {
            let mut masked = frame.clone();
            crate::frame::apply_roi(&mut masked);
            track_lane(&masked)
        } else {
            track_lane(frame)
        };

        let command = self.policy.command(lane.sighting, width, height);

        if self.annotate {
            self.debug_frame = Some(annotate(frame, &lane));
        }
        self.last_sighting = Some(lane.sighting);

        Ok((command, lane.sighting.to_string()))
    }
}
