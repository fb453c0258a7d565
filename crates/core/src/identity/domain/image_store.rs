use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::BoxError;

/// Blob storage for face snapshots.
///
/// References are opaque locator strings handed back by `store`.
pub trait ImageStore: Send + Sync {
    /// Persists the image for record `id`, returning its reference.
    fn store(&self, image_bytes: &[u8], bbox: &BoundingBox, id: &str) -> Result<String, BoxError>;

    fn exists(&self, image_ref: &str) -> bool;

    /// Removing an already-missing image succeeds.
    fn remove(&self, image_ref: &str) -> Result<(), BoxError>;
}
