use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 250.0;
/// A 5x5 square kernel applied twice reaches 4 pixels out.
const EDGE_DILATION: u8 = 4;

/// Inclusive bounds on 8 bit HSV, hue in half degrees (0..180).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|channel| self.lower[channel] <= hsv[channel] && hsv[channel] <= self.upper[channel])
    }
}

pub const SATURATED: HsvRange = HsvRange::new([0, 200, 0], [255, 255, 255]);
pub const YELLOW: HsvRange = HsvRange::new([0, 200, 0], [60, 255, 255]);
pub const BLUE: HsvRange = HsvRange::new([60, 200, 0], [120, 255, 255]);

pub struct TapeMasks {
    /// Dilated edges of the frame
    pub edges: GrayImage,
    pub saturated: GrayImage,
    pub yellow: GrayImage,
    pub blue: GrayImage,
    /// The frame with everything but saturated pixels near edges blacked out
    pub filtered: RgbImage,
}

/// Produces a dilated mask of edges in a frame.
///
/// Edges are found on every colour channel separately, so a marking that
/// only differs from the road in one channel still shows up.
pub fn canny_filter(frame: &RgbImage) -> GrayImage {
    let (width, height) = frame.dimensions();
    let mut edges = GrayImage::new(width, height);

    for channel in 0..3 {
        let plane = GrayImage::from_fn(width, height, |x, y| Luma([frame.get_pixel(x, y)[channel]]));
        let plane_edges = canny(&plane, CANNY_LOW, CANNY_HIGH);

        for (edge, plane_edge) in edges.pixels_mut().zip(plane_edges.pixels()) {
            edge[0] |= plane_edge[0];
        }
    }

    dilate(&edges, Norm::LInf, EDGE_DILATION)
}

/// Thresholds the saturated pixels of `frame` that lie on `edges`.
pub fn colour_filter(frame: &RgbImage, edges: GrayImage) -> TapeMasks {
    let (width, height) = frame.dimensions();
    let mut saturated = GrayImage::new(width, height);
    let mut yellow = GrayImage::new(width, height);
    let mut blue = GrayImage::new(width, height);
    let mut filtered = RgbImage::new(width, height);

    for (x, y, pixel) in frame.enumerate_pixels() {
        if edges.get_pixel(x, y)[0] == 0 {
            continue;
        }

        let hsv = rgb_to_hsv(*pixel);

        if SATURATED.contains(hsv) {
            saturated.put_pixel(x, y, Luma([255]));
            filtered.put_pixel(x, y, *pixel);
        }
        if YELLOW.contains(hsv) {
            yellow.put_pixel(x, y, Luma([255]));
        }
        if BLUE.contains(hsv) {
            blue.put_pixel(x, y, Luma([255]));
        }
    }

    TapeMasks { edges, saturated, yellow, blue, filtered }
}

pub fn isolate_tape(frame: &RgbImage) -> TapeMasks {
    let edges = canny_filter(frame);
    colour_filter(frame, edges)
}

/// 8 bit HSV: hue in half degrees, saturation and value scaled to 255.
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    let mut hue = (hue / 2.0).round() as u8;
    if hue >= 180 {
        hue -= 180;
    }

    [hue, saturation.round() as u8, max as u8]
}

#[cfg(test)]
mod tests {
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use super::*;

    const YELLOW_TAPE: Rgb<u8> = Rgb([255, 255, 0]);
    const BLUE_TAPE: Rgb<u8> = Rgb([0, 0, 255]);

    fn frame_with(colour: Rgb<u8>) -> RgbImage {
        let mut frame = RgbImage::new(120, 100);
        draw_filled_rect_mut(&mut frame, Rect::at(30, 20).of_size(40, 40), colour);
        frame
    }

    #[test]
    fn hsv_of_tape_colours() {
        assert_eq!(rgb_to_hsv(YELLOW_TAPE), [30, 255, 255]);
        assert_eq!(rgb_to_hsv(BLUE_TAPE), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 0])), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([128, 128, 128])), [0, 0, 128]);
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 0])), [0, 0, 0]);
        // magenta sits at 300 degrees
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 255])), [150, 255, 255]);
    }

    #[test]
    fn ranges_are_inclusive() {
        assert!(YELLOW.contains([60, 200, 0]));
        assert!(BLUE.contains([60, 200, 0]));
        assert!(!YELLOW.contains([61, 255, 255]));
        assert!(!BLUE.contains([121, 255, 255]));
        assert!(!BLUE.contains([120, 199, 255]));
    }

    #[test]
    fn edges_follow_the_border_of_a_blob() {
        let edges = canny_filter(&frame_with(BLUE_TAPE));

        assert_eq!(edges.get_pixel(30, 40)[0], 255);
        assert_eq!(edges.get_pixel(69, 40)[0], 255);
        assert_eq!(edges.get_pixel(5, 5)[0], 0);
        // middle of the blob is far from any edge
        assert_eq!(edges.get_pixel(50, 40)[0], 0);
    }

    #[test]
    fn yellow_blob_only_lands_in_the_yellow_mask() {
        let masks = isolate_tape(&frame_with(YELLOW_TAPE));

        assert_eq!(masks.yellow.get_pixel(30, 40)[0], 255);
        assert_eq!(masks.saturated.get_pixel(30, 40)[0], 255);
        assert_eq!(masks.blue.get_pixel(30, 40)[0], 0);
        assert_eq!(*masks.filtered.get_pixel(30, 40), YELLOW_TAPE);

        // background next to the border is on an edge but not saturated
        assert_eq!(masks.yellow.get_pixel(28, 40)[0], 0);
        assert_eq!(masks.yellow.get_pixel(50, 40)[0], 0);
    }

    #[test]
    fn blue_blob_only_lands_in_the_blue_mask() {
        let masks = isolate_tape(&frame_with(BLUE_TAPE));

        assert_eq!(masks.blue.get_pixel(69, 40)[0], 255);
        assert_eq!(masks.yellow.get_pixel(69, 40)[0], 0);
    }

    #[test]
    fn grey_blob_is_not_tape() {
        let masks = isolate_tape(&frame_with(Rgb([200, 200, 200])));

        assert!(masks.saturated.pixels().all(|pixel| pixel[0] == 0));
        assert!(masks.yellow.pixels().all(|pixel| pixel[0] == 0));
        assert!(masks.blue.pixels().all(|pixel| pixel[0] == 0));
    }
}
