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

/// Process-local [`FaceStore`]. Nothing survives a restart.
///
/// The `insert_*` helpers bypass id/timestamp assignment so callers can
/// seed records with a chosen creation time.
#[derive(Debug, Default)]
pub struct InMemoryFaceStore {
    records: Mutex<RecordSet>,
}

impl InMemoryFaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_known(&self, identity: KnownIdentity) -> Result<(), StoreError> {
        self.lock()?.known_identities.push(identity);
        Ok(())
    }

    pub fn insert_unassigned(&self, face: UnassignedFace) -> Result<(), StoreError> {
        self.lock()?.unassigned_faces.push(face);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<RecordSet, StoreError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, RecordSet>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl FaceStore for InMemoryFaceStore {
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
        Ok(self.lock()?.insert_unassigned(embedding, perceptual_hash, Utc::now()))
    }

    fn update_unassigned_face(&self, id: &str, update: &UnassignedFaceUpdate) -> Result<bool, BoxError> {
        Ok(self.lock()?.update_unassigned(id, update))
    }

    fn delete_unassigned_face(&self, id: &str) -> Result<bool, BoxError> {
        Ok(self.lock()?.delete_unassigned(id))
    }

    fn create_known_identity(
        &self,
        owner_id: &str,
        embedding: &Embedding,
        image_ref: Option<&str>,
    ) -> Result<KnownIdentity, BoxError> {
        Ok(self.lock()?.insert_known(owner_id, embedding, image_ref, Utc::now()))
    }

    fn update_known_identity_image(&self, id: &str, image_ref: &str) -> Result<bool, BoxError> {
        Ok(self.lock()?.update_known_image(id, image_ref))
    }

    fn append_attendance(&self, entry: &AttendanceEntry) -> Result<(), BoxError> {
        self.lock()?.attendance.push(entry.clone());
        Ok(())
    }

    fn recent_attendance(&self, limit: usize) -> Result<Vec<AttendanceEntry>, BoxError> {
        Ok(self.lock()?.recent_attendance(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn emb(v: f32) -> Embedding {
        Embedding::new(vec![v, 0.0])
    }

    #[test]
    fn test_create_then_load() {
        let store = InMemoryFaceStore::new();
        let face = store.create_unassigned_face(&emb(1.0), None).unwrap();
        let all = store.load_unassigned_faces(&UnassignedFilter::all()).unwrap();
        assert_eq!(all, vec![face]);
    }

    #[test]
    fn test_filter_applied_on_load() {
        let store = InMemoryFaceStore::new();
        let now = Utc::now();
        store
            .insert_unassigned(UnassignedFace {
                id: "old".into(),
                embedding: emb(1.0),
                perceptual_hash: Some(PerceptualHash::dct("00")),
                image_ref: None,
                created_at: now - Duration::minutes(10),
            })
            .unwrap();
        let fresh = store
            .create_unassigned_face(&emb(1.0), Some(&PerceptualHash::dct("ff")))
            .unwrap();

        let recent = store
            .load_unassigned_faces(&UnassignedFilter::recent_with_hash(now - Duration::seconds(30)))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, fresh.id);
    }

    #[test]
    fn test_delete_twice_is_benign() {
        let store = InMemoryFaceStore::new();
        let face = store.create_unassigned_face(&emb(1.0), None).unwrap();
        assert!(store.delete_unassigned_face(&face.id).unwrap());
        assert!(!store.delete_unassigned_face(&face.id).unwrap());
    }

    #[test]
    fn test_known_identity_image_update() {
        let store = InMemoryFaceStore::new();
        let k = store.create_known_identity("emp-1", &emb(1.0), None).unwrap();
        assert!(store.update_known_identity_image(&k.id, "k.jpg").unwrap());
        let loaded = store.load_known_identities().unwrap();
        assert_eq!(loaded[0].image_ref.as_deref(), Some("k.jpg"));
        assert_eq!(loaded[0].owner_id, "emp-1");
    }

    #[test]
    fn test_concurrent_creates() {
        let store = Arc::new(InMemoryFaceStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.create_unassigned_face(&emb(i as f32), None).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.snapshot().unwrap().unassigned_faces.len(), 8);
    }
}
