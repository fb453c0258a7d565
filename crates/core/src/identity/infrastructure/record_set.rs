//! Plain in-memory record collections shared by the bundled store adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hashing::domain::perceptual_hash::PerceptualHash;
use crate::identity::domain::attendance_entry::AttendanceEntry;
use crate::identity::domain::known_identity::KnownIdentity;
use crate::identity::domain::unassigned_face::{UnassignedFace, UnassignedFaceUpdate, UnassignedFilter};
use crate::shared::embedding::Embedding;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSet {
    pub known_identities: Vec<KnownIdentity>,
    pub unassigned_faces: Vec<UnassignedFace>,
    pub attendance: Vec<AttendanceEntry>,
}

impl RecordSet {
    pub fn unassigned(&self, filter: &UnassignedFilter) -> Vec<UnassignedFace> {
        self.unassigned_faces
            .iter()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect()
    }

    pub fn find_unassigned(&self, id: &str) -> Option<UnassignedFace> {
        self.unassigned_faces.iter().find(|f| f.id == id).cloned()
    }

    pub fn insert_unassigned(
        &mut self,
        embedding: &Embedding,
        perceptual_hash: Option<&PerceptualHash>,
        now: DateTime<Utc>,
    ) -> UnassignedFace {
        let face = UnassignedFace {
            id: new_id(),
            embedding: embedding.clone(),
            perceptual_hash: perceptual_hash.cloned(),
            image_ref: None,
            created_at: now,
        };
        self.unassigned_faces.push(face.clone());
        face
    }

    pub fn update_unassigned(&mut self, id: &str, update: &UnassignedFaceUpdate) -> bool {
        let Some(face) = self.unassigned_faces.iter_mut().find(|f| f.id == id) else {
            return false;
        };
        if let Some(image_ref) = &update.image_ref {
            face.image_ref = Some(image_ref.clone());
        }
        true
    }

    pub fn delete_unassigned(&mut self, id: &str) -> bool {
        let before = self.unassigned_faces.len();
        self.unassigned_faces.retain(|f| f.id != id);
        self.unassigned_faces.len() != before
    }

    pub fn insert_known(
        &mut self,
        owner_id: &str,
        embedding: &Embedding,
        image_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> KnownIdentity {
        let identity = KnownIdentity {
            id: new_id(),
            owner_id: owner_id.to_string(),
            embedding: embedding.clone(),
            image_ref: image_ref.map(str::to_string),
            created_at: now,
        };
        self.known_identities.push(identity.clone());
        identity
    }

    pub fn update_known_image(&mut self, id: &str, image_ref: &str) -> bool {
        match self.known_identities.iter_mut().find(|k| k.id == id) {
            Some(identity) => {
                identity.image_ref = Some(image_ref.to_string());
                true
            }
            None => false,
        }
    }

    pub fn recent_attendance(&self, limit: usize) -> Vec<AttendanceEntry> {
        let mut entries = self.attendance.clone();
        entries.sort_by(|a, b| b.checked_in_at.cmp(&a.checked_in_at));
        entries.truncate(limit);
        entries
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
