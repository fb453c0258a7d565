use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::embedding::Embedding;

/// One face returned by the detection model for a single image.
///
/// Keypoints are the model's five facial landmarks; they travel with the
/// face but the matching engine does not interpret them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    #[serde(default)]
    pub keypoints: Vec<[f64; 2]>,
    pub detection_score: f64,
    pub embedding: Embedding,
}

impl DetectedFace {
    pub fn new(bbox: BoundingBox, detection_score: f64, embedding: Embedding) -> Self {
        Self {
            bbox,
            keypoints: Vec::new(),
            detection_score,
            embedding,
        }
    }
}
