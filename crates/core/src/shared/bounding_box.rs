use serde::{Deserialize, Serialize};

/// Face bounding box in source-image pixels, serialized as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Square region centered on the box, grown by `padding` (fraction of
    /// the longer side) and clamped to `frame_w x frame_h`.
    ///
    /// Returns `(x, y, width, height)` in whole pixels, or `None` when the
    /// clamped square is empty.
    pub fn square_crop(&self, frame_w: u32, frame_h: u32, padding: f64) -> Option<(u32, u32, u32, u32)> {
        let cx = (self.x1 + self.x2) / 2.0;
        let cy = (self.y1 + self.y2) / 2.0;
        let half = self.width().max(self.height()) * (1.0 + padding) / 2.0;

        let x1 = (cx - half).max(0.0).floor() as u32;
        let y1 = (cy - half).max(0.0).floor() as u32;
        let x2 = ((cx + half).min(frame_w as f64).ceil() as u32).min(frame_w);
        let y2 = ((cy + half).min(frame_h as f64).ceil() as u32).min(frame_h);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}
