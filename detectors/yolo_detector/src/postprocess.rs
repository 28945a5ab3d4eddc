use taboo::{BoundingBox, DetectionResult};

/// The network's total stride. Input sides must be multiples of it.
pub const MAX_STRIDE: u32 = 32;

/// Scales `(width, height)` so the longer edge is `size` and the shorter one
/// is rounded down to a multiple of [`MAX_STRIDE`]. `size` must be such a
/// multiple itself.
pub fn inference_size(width: u32, height: u32, size: u32) -> (u32, u32) {
    let scale = |short: u32, long: u32| {
        let scaled = (short as u64 * size as u64 / long.max(1) as u64) as u32;
        (scaled / MAX_STRIDE * MAX_STRIDE).max(MAX_STRIDE)
    };
    if width < height {
        (scale(width, height), size)
    } else {
        (size, scale(height, width))
    }
}

/// A box in inference coordinates, before suppression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub class_index: usize,
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.xmax - self.xmin).max(0.) * (self.ymax - self.ymin).max(0.)
    }

    pub fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.xmax.min(other.xmax) - self.xmin.max(other.xmin)).max(0.);
        let h = (self.ymax.min(other.ymax) - self.ymin.max(other.ymin)).max(0.);
        let intersection = w * h;
        let union = self.area() + other.area() - intersection;
        if union <= 0. {
            0.
        } else {
            intersection / union
        }
    }
}

/// Reads one prediction per row, laid out as center x, center y, width and
/// height followed by one score per class. Keeps each row's best class if its
/// score exceeds `confidence_threshold`.
pub fn candidates(rows: &[Vec<f32>], confidence_threshold: f32) -> Vec<Candidate> {
    rows.iter()
        .filter_map(|row| {
            let (class_index, confidence) = row
                .get(4..)?
                .iter()
                .copied()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
            if confidence <= confidence_threshold {
                return None;
            }
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            Some(Candidate {
                class_index,
                confidence,
                xmin: cx - w / 2.,
                ymin: cy - h / 2.,
                xmax: cx + w / 2.,
                ymax: cy + h / 2.,
            })
        })
        .collect()
}

/// Per-class greedy suppression. The result is ordered by descending confidence.
pub fn non_maximum_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index && k.iou(&candidate) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Maps a candidate back to the original image. Unknown class indices are dropped.
pub fn to_detection(
    candidate: &Candidate,
    labels: &[&str],
    scale_x: f32,
    scale_y: f32,
) -> Option<DetectionResult> {
    let label = labels.get(candidate.class_index)?;
    // Truncating, like integer pixel coordinates usually are
    let bounding_box = BoundingBox::new(
        (candidate.xmin * scale_x) as i32,
        (candidate.ymin * scale_y) as i32,
        (candidate.xmax * scale_x) as i32,
        (candidate.ymax * scale_y) as i32,
    );
    Some(DetectionResult::new(label, bounding_box))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(class_index: usize, confidence: f32, xmin: f32, ymin: f32, size: f32) -> Candidate {
        Candidate {
            class_index,
            confidence,
            xmin,
            ymin,
            xmax: xmin + size,
            ymax: ymin + size,
        }
    }

    #[test]
    fn longer_edge_becomes_the_inference_size() {
        assert_eq!(inference_size(1024, 1024, 640), (640, 640));
        assert_eq!(inference_size(1000, 500, 640), (640, 320));
        assert_eq!(inference_size(500, 1000, 640), (320, 640));
        assert_eq!(inference_size(1000, 610, 640), (640, 384));
        assert_eq!(inference_size(10, 1000, 640), (32, 640));
        assert_eq!(inference_size(128, 64, 64), (64, 32));
    }

    #[test]
    fn rows_below_the_threshold_are_dropped() {
        let rows = vec![
            vec![50., 50., 20., 10., 0.1, 0.9, 0.3],
            vec![10., 10., 4., 4., 0.2, 0.1, 0.25],
            vec![1., 2., 3.],
        ];
        let found = candidates(&rows, 0.25);
        assert_eq!(
            found,
            vec![Candidate {
                class_index: 1,
                confidence: 0.9,
                xmin: 40.,
                ymin: 45.,
                xmax: 60.,
                ymax: 55.,
            }]
        );
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = candidate(0, 0.9, 0., 0., 10.);
        assert_eq!(a.iou(&a), 1.);
        assert_eq!(a.iou(&candidate(0, 0.9, 20., 20., 10.)), 0.);
        // Half overlap: 50 / 150
        let b = candidate(0, 0.9, 5., 0., 10.);
        assert!((a.iou(&Candidate { ymax: 10., ..b }) - 1. / 3.).abs() < 1e-6);
    }

    #[test]
    fn overlapping_boxes_of_one_class_are_merged() {
        let kept = non_maximum_suppression(
            vec![
                candidate(53, 0.6, 1., 1., 100.),
                candidate(53, 0.8, 0., 0., 100.),
                // Another class in the same place survives
                candidate(60, 0.5, 0., 0., 100.),
                // Same class elsewhere survives
                candidate(53, 0.4, 300., 300., 50.),
            ],
            0.7,
        );
        assert_eq!(
            kept.iter().map(|c| (c.class_index, c.confidence)).collect::<Vec<_>>(),
            vec![(53, 0.8), (60, 0.5), (53, 0.4)]
        );
    }

    #[test]
    fn detections_are_scaled_to_the_original_image() {
        let labels = ["person", "pizza"];
        let c = candidate(1, 0.9, 10., 20., 30.);
        assert_eq!(
            to_detection(&c, &labels, 2., 1.5),
            Some(DetectionResult::new("pizza", BoundingBox::new(20, 30, 80, 75)))
        );
        assert_eq!(to_detection(&candidate(7, 0.9, 0., 0., 1.), &labels, 1., 1.), None);
    }
}
