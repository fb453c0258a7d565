use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::hashing::domain::perceptual_hash::PerceptualHash;
use crate::identity::domain::attendance_entry::AttendanceEntry;
use crate::identity::domain::face_store::FaceStore;
use crate::identity::domain::known_identity::KnownIdentity;
use crate::identity::domain::unassigned_face::{UnassignedFace, UnassignedFaceUpdate, UnassignedFilter};
use crate::identity::infrastructure::record_set::RecordSet;
use crate::shared::embedding::Embedding;
use crate::shared::error::{BoxError, StoreError};

/// [`FaceStore`] persisted as a single JSON document.
///
/// Every mutation rewrites the file through a `.part` sibling and a rename,
/// so a crash never leaves a half-written document. Safe for concurrent use
/// within one process; separate processes sharing a file are not
/// coordinated.
#[derive(Debug)]
pub struct JsonFileFaceStore {
    path: PathBuf,
    records: Mutex<RecordSet>,
}

impl JsonFileFaceStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let records = if path.exists() {
            let json = fs::read_to_string(path).map_err(|source| StoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            RecordSet::default()
        };
        log::debug!(
            "Opened record store {} ({} known, {} unassigned)",
            path.display(),
            records.known_identities.len(),
            records.unassigned_faces.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecordSet>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Applies `f` to a copy, persists it, then swaps it in. The in-memory
    /// state only changes once the file write succeeded.
    fn mutate<T>(&self, f: impl FnOnce(&mut RecordSet) -> T) -> Result<T, StoreError> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = f(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, records: &RecordSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(records).map_err(StoreError::Serialize)?;
        let temp_path = self.path.with_extension("json.part");
        fs::write(&temp_path, json).map_err(|source| StoreError::Write {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl FaceStore for JsonFileFaceStore {
    fn load_known_identities(&self) -> Result<Vec<KnownIdentity>, BoxError> {
        Ok(self.lock()?.known_identities.clone())
    }

    fn load_unassigned_faces(&self, filter: &UnassignedFilter) -> Result<Vec<UnassignedFace>, BoxError> {
        Ok(self.lock()?.unassigned(filter))
    }

    fn get_unassigned_face(&self, id: &str) -> Result<Option<UnassignedFace>, BoxError> {
        Ok(self.lock()?.find_unassigned(id))
    }

    fn create_unassigned_face(
        &self,
        embedding: &Embedding,
        perceptual_hash: Option<&PerceptualHash>,
    ) -> Result<UnassignedFace, BoxError> {
        Ok(self.mutate(|r| r.insert_unassigned(embedding, perceptual_hash, Utc::now()))?)
    }

    fn update_unassigned_face(&self, id: &str, update: &UnassignedFaceUpdate) -> Result<bool, BoxError> {
        Ok(self.mutate(|r| r.update_unassigned(id, update))?)
    }

    fn delete_unassigned_face(&self, id: &str) -> Result<bool, BoxError> {
        Ok(self.mutate(|r| r.delete_unassigned(id))?)
    }

    fn create_known_identity(
        &self,
        owner_id: &str,
        embedding: &Embedding,
        image_ref: Option<&str>,
    ) -> Result<KnownIdentity, BoxError> {
        Ok(self.mutate(|r| r.insert_known(owner_id, embedding, image_ref, Utc::now()))?)
    }

    fn update_known_identity_image(&self, id: &str, image_ref: &str) -> Result<bool, BoxError> {
        Ok(self.mutate(|r| r.update_known_image(id, image_ref))?)
    }

    fn append_attendance(&self, entry: &AttendanceEntry) -> Result<(), BoxError> {
        Ok(self.mutate(|r| r.attendance.push(entry.clone()))?)
    }

    fn recent_attendance(&self, limit: usize) -> Result<Vec<AttendanceEntry>, BoxError> {
        Ok(self.lock()?.recent_attendance(limit))
    }
}
