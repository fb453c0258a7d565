use std::sync::Arc;

use thiserror::Error;

use crate::identity::domain::face_detector::FaceDetector;
use crate::identity::domain::face_store::FaceStore;
use crate::identity::domain::image_store::ImageStore;
use crate::identity::domain::known_identity::KnownIdentity;
use crate::shared::error::BoxError;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("owner id must not be empty")]
    MissingOwner,
    #[error("no face detected in the reference photo")]
    NoFaceDetected,
    #[error("face detection failed: {0}")]
    Detect(#[source] BoxError),
    #[error("record store failed: {0}")]
    Store(#[source] BoxError),
}

/// Adds a reference photo for an owner to the known gallery.
///
/// Only the first detected face is enrolled. A snapshot that cannot be
/// stored leaves the identity without an image reference.
pub struct EnrollFaceUseCase {
    detector: Arc<dyn FaceDetector>,
    store: Arc<dyn FaceStore>,
    images: Arc<dyn ImageStore>,
}

impl EnrollFaceUseCase {
    pub fn new(detector: Arc<dyn FaceDetector>, store: Arc<dyn FaceStore>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            detector,
            store,
            images,
        }
    }

    pub fn execute(&self, owner_id: &str, image_bytes: &[u8]) -> Result<KnownIdentity, EnrollError> {
        if owner_id.trim().is_empty() {
            return Err(EnrollError::MissingOwner);
        }
        let faces = self.detector.detect(image_bytes).map_err(EnrollError::Detect)?;
        if faces.len() > 1 {
            log::warn!("Reference photo has {} faces; enrolling the first", faces.len());
        }
        let face = faces.into_iter().next().ok_or(EnrollError::NoFaceDetected)?;

        let mut identity = self
            .store
            .create_known_identity(owner_id, &face.embedding, None)
            .map_err(EnrollError::Store)?;

        match self.images.store(image_bytes, &face.bbox, &identity.id) {
            Ok(image_ref) => match self.store.update_known_identity_image(&identity.id, &image_ref) {
                Ok(true) => identity.image_ref = Some(image_ref),
                Ok(false) => log::warn!("Identity {} vanished before its image was attached", identity.id),
                Err(e) => log::warn!("Failed to attach image to identity {}: {e}", identity.id),
            },
            Err(e) => log::warn!("Failed to store reference image for {owner_id}: {e}"),
        }

        log::info!("Enrolled identity {} for owner {owner_id}", identity.id);
        Ok(identity)
    }
}
