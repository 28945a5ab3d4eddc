use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::{BoundingBox, DetectionResult};

/// Outline color of the boxes around matching detections.
pub const MATCH_OUTLINE_COLOR: Rgb<u8> = Rgb([0, 128, 0]);
/// Outline width in pixels. The stroke grows inward from the box edges.
pub const MATCH_OUTLINE_WIDTH: i32 = 6;

/// Whether a generated image was judged to depict the target.
#[derive(Clone, Debug)]
pub struct Verdict {
    pub found: bool,
    /// The input image with a rectangle around every matching detection.
    pub annotated_image: RgbImage,
    /// The boxes that were drawn, in detection order.
    pub matches: Vec<BoundingBox>,
}

/// Judges `detections` against `target_label` and annotates a copy of `image`.
///
/// A detection matches when its label is exactly `target_label`. There is no
/// confidence threshold here, whatever the detector reported is taken as is.
pub fn build_verdict(target_label: &str, detections: &[DetectionResult], image: &RgbImage) -> Verdict {
    let mut annotated_image = image.clone();
    let matches: Vec<BoundingBox> = detections
        .iter()
        .filter(|detection| detection.label == target_label)
        .map(|detection| detection.bounding_box)
        .collect();
    for bounding_box in &matches {
        draw_outline(&mut annotated_image, bounding_box);
    }
    Verdict {
        found: !matches.is_empty(),
        annotated_image,
        matches,
    }
}

fn draw_outline(image: &mut RgbImage, bounding_box: &BoundingBox) {
    let b = bounding_box.normalized();
    let (x1, y1, x2, y2) = (b.x1 as i64, b.y1 as i64, b.x2 as i64, b.y2 as i64);
    let stroke = MATCH_OUTLINE_WIDTH as i64 - 1;
    // The outline is four bands along the inside of the box edges
    fill_clipped(image, x1, y1, x2, (y1 + stroke).min(y2));
    fill_clipped(image, x1, (y2 - stroke).max(y1), x2, y2);
    fill_clipped(image, x1, y1, (x1 + stroke).min(x2), y2);
    fill_clipped(image, (x2 - stroke).max(x1), y1, x2, y2);
}

/// Fills the inclusive rectangle `(x1, y1)..=(x2, y2)` where it overlaps the image.
fn fill_clipped(image: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64) {
    let x1 = x1.max(0);
    let y1 = y1.max(0);
    let x2 = x2.min(image.width() as i64 - 1);
    let y2 = y2.min(image.height() as i64 - 1);
    if x1 > x2 || y1 > y2 {
        return;
    }
    let rect = Rect::at(x1 as i32, y1 as i32).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32);
    draw_filled_rect_mut(image, rect, MATCH_OUTLINE_COLOR);
}
