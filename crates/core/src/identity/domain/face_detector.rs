use crate::identity::domain::detected_face::DetectedFace;
use crate::shared::error::BoxError;

/// Domain interface for the external detection + embedding model.
///
/// Takes encoded image bytes exactly as submitted by the kiosk.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>, BoxError>;
}
