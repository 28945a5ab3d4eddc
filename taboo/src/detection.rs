use serde::{Deserialize, Serialize};

/// A rectangle in pixel coordinates, given by two inclusive corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The same box with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let b = self.normalized();
        x >= b.x1 && y >= b.y1 && x <= b.x2 && y <= b.y2
    }
}

/// One object instance reported by the detector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// A label from the detector's closed vocabulary.
    pub label: String,
    pub bounding_box: BoundingBox,
}

impl DetectionResult {
    pub fn new(label: &str, bounding_box: BoundingBox) -> Self {
        Self {
            label: String::from(label),
            bounding_box,
        }
    }
}
