use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use thiserror::Error;

use crate::identity::domain::face_store::FaceStore;
use crate::identity::domain::image_store::ImageStore;
use crate::identity::domain::unassigned_face::{UnassignedFace, UnassignedFilter};
use crate::pipeline::duplicate_policy::{find_duplicate_pairs, DuplicatePair};
use crate::shared::config::EngineConfig;
use crate::shared::embedding::EmbeddingError;
use crate::shared::error::BoxError;

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("record store failed: {0}")]
    Store(#[source] BoxError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    pub removed_missing_image: usize,
    pub removed_duplicates: usize,
    pub remaining: usize,
    pub duplicates: Vec<DuplicatePair>,
}

/// Offline sweep over the whole unassigned pool.
///
/// First drops records whose snapshot is missing, then collapses records
/// whose embeddings repeat an earlier record within the batch window.
/// Records that disappear mid-pass are skipped.
pub struct DeduplicateFacesUseCase {
    store: Arc<dyn FaceStore>,
    images: Arc<dyn ImageStore>,
    similarity_threshold: f64,
    window: Duration,
}

impl DeduplicateFacesUseCase {
    pub fn new(store: Arc<dyn FaceStore>, images: Arc<dyn ImageStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            images,
            similarity_threshold: config.batch_similarity_threshold,
            window: config.batch_window(),
        }
    }

    pub fn execute(&self) -> Result<CleanupReport, CleanupError> {
        let mut report = CleanupReport::default();

        for face in self.load_all()? {
            if self.has_image(&face) {
                continue;
            }
            log::debug!("Unassigned face {} has no stored image", face.id);
            if self.delete(&face.id)? {
                report.removed_missing_image += 1;
            }
        }

        let records = self.load_all()?;
        report.duplicates = find_duplicate_pairs(&records, self.window, self.similarity_threshold)?;

        for pair in &report.duplicates {
            log::debug!(
                "Unassigned face {} duplicates {} (similarity {:.3})",
                pair.duplicate_id,
                pair.kept_id,
                pair.similarity
            );
            if !self.delete(&pair.duplicate_id)? {
                continue;
            }
            report.removed_duplicates += 1;
            // Only images of records this pass deleted.
            let image_ref = records
                .iter()
                .find(|f| f.id == pair.duplicate_id)
                .and_then(|f| f.image_ref.as_deref());
            if let Some(image_ref) = image_ref {
                if let Err(e) = self.images.remove(image_ref) {
                    log::warn!("Failed to remove image {image_ref}: {e}");
                }
            }
        }

        report.remaining = records.len().saturating_sub(report.removed_duplicates);
        log::info!(
            "Cleanup removed {} face(s) without images and {} duplicate(s); {} remaining",
            report.removed_missing_image,
            report.removed_duplicates,
            report.remaining
        );
        Ok(report)
    }

    fn load_all(&self) -> Result<Vec<UnassignedFace>, CleanupError> {
        self.store
            .load_unassigned_faces(&UnassignedFilter::all())
            .map_err(CleanupError::Store)
    }

    fn has_image(&self, face: &UnassignedFace) -> bool {
        face.image_ref
            .as_deref()
            .is_some_and(|image_ref| self.images.exists(image_ref))
    }

    /// `false` when another writer already removed the record.
    fn delete(&self, id: &str) -> Result<bool, CleanupError> {
        let deleted = self
            .store
            .delete_unassigned_face(id)
            .map_err(CleanupError::Store)?;
        if !deleted {
            log::debug!("Unassigned face {id} already gone");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::domain::perceptual_hash::PerceptualHash;
    use crate::identity::domain::attendance_entry::AttendanceEntry;
    use crate::identity::domain::known_identity::KnownIdentity;
    use crate::identity::domain::unassigned_face::UnassignedFaceUpdate;
    use crate::identity::infrastructure::in_memory_face_store::InMemoryFaceStore;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::embedding::Embedding;
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;
    use std::sync::Mutex;

    // --- Stubs ---

    struct StubImageStore {
        present: Mutex<HashSet<String>>,
        removed: Arc<Mutex<Vec<String>>>,
    }

    impl StubImageStore {
        fn with(refs: &[&str]) -> Self {
            Self {
                present: Mutex::new(refs.iter().map(|r| r.to_string()).collect()),
                removed: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ImageStore for StubImageStore {
        fn store(&self, _image_bytes: &[u8], _bbox: &BoundingBox, id: &str) -> Result<String, BoxError> {
            Ok(format!("{id}.jpg"))
        }

        fn exists(&self, image_ref: &str) -> bool {
            self.present.lock().unwrap().contains(image_ref)
        }

        fn remove(&self, image_ref: &str) -> Result<(), BoxError> {
            self.present.lock().unwrap().remove(image_ref);
            self.removed.lock().unwrap().push(image_ref.to_string());
            Ok(())
        }
    }

    /// Store whose deletes report the record as already gone.
    struct RacingStore {
        inner: InMemoryFaceStore,
    }

    impl FaceStore for RacingStore {
        fn load_known_identities(&self) -> Result<Vec<KnownIdentity>, BoxError> {
            self.inner.load_known_identities()
        }

        fn load_unassigned_faces(&self, filter: &UnassignedFilter) -> Result<Vec<UnassignedFace>, BoxError> {
            self.inner.load_unassigned_faces(filter)
        }

        fn get_unassigned_face(&self, id: &str) -> Result<Option<UnassignedFace>, BoxError> {
            self.inner.get_unassigned_face(id)
        }

        fn create_unassigned_face(
            &self,
            embedding: &Embedding,
            perceptual_hash: Option<&PerceptualHash>,
        ) -> Result<UnassignedFace, BoxError> {
            self.inner.create_unassigned_face(embedding, perceptual_hash)
        }

        fn update_unassigned_face(
            &self,
            id: &str,
            update: &UnassignedFaceUpdate,
        ) -> Result<bool, BoxError> {
            self.inner.update_unassigned_face(id, update)
        }

        fn delete_unassigned_face(&self, _id: &str) -> Result<bool, BoxError> {
            Ok(false)
        }

        fn create_known_identity(
            &self,
            owner_id: &str,
            embedding: &Embedding,
            image_ref: Option<&str>,
        ) -> Result<KnownIdentity, BoxError> {
            self.inner.create_known_identity(owner_id, embedding, image_ref)
        }

        fn update_known_identity_image(&self, id: &str, image_ref: &str) -> Result<bool, BoxError> {
            self.inner.update_known_identity_image(id, image_ref)
        }

        fn append_attendance(
            &self,
            entry: &AttendanceEntry,
        ) -> Result<(), BoxError> {
            self.inner.append_attendance(entry)
        }

        fn recent_attendance(
            &self,
            limit: usize,
        ) -> Result<Vec<AttendanceEntry>, BoxError> {
            self.inner.recent_attendance(limit)
        }
    }

    // --- Helpers ---

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn face(id: &str, values: [f32; 2], offset_secs: i64, image: bool) -> UnassignedFace {
        UnassignedFace {
            id: id.into(),
            embedding: Embedding::new(values.to_vec()),
            perceptual_hash: None,
            image_ref: image.then(|| format!("{id}.jpg")),
            created_at: base() + Duration::seconds(offset_secs),
        }
    }

    fn seeded(faces: Vec<UnassignedFace>) -> Arc<InMemoryFaceStore> {
        let store = Arc::new(InMemoryFaceStore::new());
        for f in faces {
            store.insert_unassigned(f).unwrap();
        }
        store
    }

    fn remaining_ids(store: &InMemoryFaceStore) -> Vec<String> {
        let mut ids: Vec<String> = store
            .snapshot()
            .unwrap()
            .unassigned_faces
            .into_iter()
            .map(|f| f.id)
            .collect();
        ids.sort();
        ids
    }

    // --- Tests ---

    #[test]
    fn test_later_duplicate_removed_with_image() {
        let store = seeded(vec![
            face("early", [1.0, 0.0], 0, true),
            face("late", [0.95, 0.31], 60, true),
        ]);
        let images = Arc::new(StubImageStore::with(&["early.jpg", "late.jpg"]));
        let removed = images.removed.clone();
        let uc = DeduplicateFacesUseCase::new(store.clone(), images, &EngineConfig::default());

        let report = uc.execute().unwrap();

        assert_eq!(report.removed_duplicates, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(report.duplicates[0].kept_id, "early");
        assert_eq!(remaining_ids(&store), vec!["early"]);
        assert_eq!(*removed.lock().unwrap(), vec!["late.jpg"]);
    }

    #[test]
    fn test_three_similar_leave_one_survivor() {
        let store = seeded(vec![
            face("a", [1.0, 0.0], 0, true),
            face("b", [1.0, 0.0], 30, true),
            face("c", [1.0, 0.0], 90, true),
        ]);
        let images = Arc::new(StubImageStore::with(&["a.jpg", "b.jpg", "c.jpg"]));
        let uc = DeduplicateFacesUseCase::new(store.clone(), images, &EngineConfig::default());

        let report = uc.execute().unwrap();

        assert_eq!(report.removed_duplicates, 2);
        assert_eq!(remaining_ids(&store), vec!["a"]);
    }

    #[test]
    fn test_missing_images_removed_first() {
        let store = seeded(vec![
            face("no-ref", [1.0, 0.0], 0, false),
            face("lost-file", [0.0, 1.0], 10, true),
            face("ok", [0.0, 1.0], 20, true),
        ]);
        let images = Arc::new(StubImageStore::with(&["ok.jpg"]));
        let uc = DeduplicateFacesUseCase::new(store.clone(), images, &EngineConfig::default());

        let report = uc.execute().unwrap();

        assert_eq!(report.removed_missing_image, 2);
        assert_eq!(report.removed_duplicates, 0);
        assert_eq!(report.remaining, 1);
        assert_eq!(remaining_ids(&store), vec!["ok"]);
    }

    #[test]
    fn test_records_outside_window_survive() {
        let store = seeded(vec![
            face("a", [1.0, 0.0], 0, true),
            face("b", [1.0, 0.0], 10 * 60, true),
        ]);
        let images = Arc::new(StubImageStore::with(&["a.jpg", "b.jpg"]));
        let uc = DeduplicateFacesUseCase::new(store.clone(), images, &EngineConfig::default());

        let report = uc.execute().unwrap();

        assert!(report.duplicates.is_empty());
        assert_eq!(report.remaining, 2);
    }

    #[test]
    fn test_vanished_record_is_noop() {
        let inner = InMemoryFaceStore::new();
        inner.insert_unassigned(face("a", [1.0, 0.0], 0, true)).unwrap();
        inner.insert_unassigned(face("b", [1.0, 0.0], 5, true)).unwrap();
        let store = Arc::new(RacingStore { inner });
        let images = Arc::new(StubImageStore::with(&["a.jpg", "b.jpg"]));
        let removed = images.removed.clone();
        let uc = DeduplicateFacesUseCase::new(store, images, &EngineConfig::default());

        let report = uc.execute().unwrap();

        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.removed_duplicates, 0);
        assert!(removed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_pool() {
        let uc = DeduplicateFacesUseCase::new(
            Arc::new(InMemoryFaceStore::new()),
            Arc::new(StubImageStore::with(&[])),
            &EngineConfig::default(),
        );
        assert_eq!(uc.execute().unwrap(), CleanupReport::default());
    }
}
