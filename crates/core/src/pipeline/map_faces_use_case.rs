use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::identity::domain::attendance_entry::AttendanceEntry;
use crate::identity::domain::face_store::FaceStore;
use crate::identity::domain::known_identity::KnownIdentity;
use crate::identity::domain::unassigned_face::{UnassignedFace, UnassignedFilter};
use crate::shared::error::BoxError;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("no faces selected")]
    NoFacesSelected,
    #[error("owner id must not be empty")]
    MissingOwner,
    #[error("record store failed: {0}")]
    Store(#[source] BoxError),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AssignReport {
    pub created: Vec<KnownIdentity>,
    /// Requested ids that were no longer in the pool.
    pub missing: Vec<String>,
}

/// Admin operations over the unassigned pool: promote faces to an owner's
/// known identities, discard them, and list recent activity.
pub struct MapFacesUseCase {
    store: Arc<dyn FaceStore>,
}

impl MapFacesUseCase {
    pub fn new(store: Arc<dyn FaceStore>) -> Self {
        Self { store }
    }

    /// Moves each listed unassigned face into the known gallery under
    /// `owner_id`, keeping its embedding and image. Unknown ids are skipped.
    pub fn assign(&self, face_ids: &[String], owner_id: &str) -> Result<AssignReport, MappingError> {
        if face_ids.is_empty() {
            return Err(MappingError::NoFacesSelected);
        }
        if owner_id.trim().is_empty() {
            return Err(MappingError::MissingOwner);
        }

        let mut report = AssignReport::default();
        for id in face_ids {
            let Some(face) = self.store.get_unassigned_face(id).map_err(MappingError::Store)? else {
                log::debug!("Unassigned face {id} not found, skipping");
                report.missing.push(id.clone());
                continue;
            };
            let identity = self
                .store
                .create_known_identity(owner_id, &face.embedding, face.image_ref.as_deref())
                .map_err(MappingError::Store)?;
            self.store
                .delete_unassigned_face(id)
                .map_err(MappingError::Store)?;
            log::info!("Assigned face {id} to owner {owner_id} as identity {}", identity.id);
            report.created.push(identity);
        }
        Ok(report)
    }

    /// Deletes the listed records, returning how many existed. Stored images
    /// are left for the cleanup pass.
    pub fn discard(&self, face_ids: &[String]) -> Result<usize, MappingError> {
        if face_ids.is_empty() {
            return Err(MappingError::NoFacesSelected);
        }
        let mut deleted = 0;
        for id in face_ids {
            if self
                .store
                .delete_unassigned_face(id)
                .map_err(MappingError::Store)?
            {
                deleted += 1;
            }
        }
        log::info!("Discarded {deleted} of {} unassigned face(s)", face_ids.len());
        Ok(deleted)
    }

    /// Newest first.
    pub fn recent_unassigned(&self, limit: usize) -> Result<Vec<UnassignedFace>, MappingError> {
        let mut faces = self
            .store
            .load_unassigned_faces(&UnassignedFilter::all())
            .map_err(MappingError::Store)?;
        faces.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        faces.truncate(limit);
        Ok(faces)
    }

    pub fn recent_attendance(&self, limit: usize) -> Result<Vec<AttendanceEntry>, MappingError> {
        self.store
            .recent_attendance(limit)
            .map_err(MappingError::Store)
    }
}
