use crate::hashing::domain::perceptual_hash::PerceptualHash;
use crate::identity::domain::attendance_entry::AttendanceEntry;
use crate::identity::domain::known_identity::KnownIdentity;
use crate::identity::domain::unassigned_face::{UnassignedFace, UnassignedFaceUpdate, UnassignedFilter};
use crate::shared::embedding::Embedding;
use crate::shared::error::BoxError;

/// Domain interface for the record store holding the known gallery, the
/// unassigned pool and the attendance log.
///
/// Handles are shared across concurrent requests, hence `&self`. Update and
/// delete return `false` when the record no longer exists so callers racing
/// with other writers can treat that as a no-op.
pub trait FaceStore: Send + Sync {
    fn load_known_identities(&self) -> Result<Vec<KnownIdentity>, BoxError>;

    fn load_unassigned_faces(&self, filter: &UnassignedFilter) -> Result<Vec<UnassignedFace>, BoxError>;

    fn get_unassigned_face(&self, id: &str) -> Result<Option<UnassignedFace>, BoxError>;

    /// Creates a record stamped with the store's current time.
    fn create_unassigned_face(
        &self,
        embedding: &Embedding,
        perceptual_hash: Option<&PerceptualHash>,
    ) -> Result<UnassignedFace, BoxError>;

    fn update_unassigned_face(&self, id: &str, update: &UnassignedFaceUpdate) -> Result<bool, BoxError>;

    fn delete_unassigned_face(&self, id: &str) -> Result<bool, BoxError>;

    fn create_known_identity(
        &self,
        owner_id: &str,
        embedding: &Embedding,
        image_ref: Option<&str>,
    ) -> Result<KnownIdentity, BoxError>;

    fn update_known_identity_image(&self, id: &str, image_ref: &str) -> Result<bool, BoxError>;

    fn append_attendance(&self, entry: &AttendanceEntry) -> Result<(), BoxError>;

    /// Most recent entries first.
    fn recent_attendance(&self, limit: usize) -> Result<Vec<AttendanceEntry>, BoxError>;
}
