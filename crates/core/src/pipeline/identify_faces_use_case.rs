use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::hashing::domain::image_hasher::ImageHasher;
use crate::hashing::domain::perceptual_hash::PerceptualHash;
use crate::identity::domain::attendance_entry::AttendanceEntry;
use crate::identity::domain::detected_face::DetectedFace;
use crate::identity::domain::face_detector::FaceDetector;
use crate::identity::domain::face_store::FaceStore;
use crate::identity::domain::image_store::ImageStore;
use crate::identity::domain::known_identity::KnownIdentity;
use crate::identity::domain::unassigned_face::{UnassignedFace, UnassignedFaceUpdate, UnassignedFilter};
use crate::pipeline::duplicate_policy::find_duplicate;
use crate::pipeline::identification::{
    Classification, IdentifiedFace, IdentifyOutcome, MatchBasis, PersistenceFailure,
    PersistenceStep, SkippedFace,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::config::EngineConfig;
use crate::shared::embedding::{best_match, EmbeddingError, Match};
use crate::shared::error::BoxError;

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("face detection failed: {0}")]
    Detect(#[source] BoxError),
    #[error("record store failed: {0}")]
    Store(#[source] BoxError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Classifies every face in a kiosk snapshot as a known owner, a repeat of
/// an unassigned face, or a new unassigned face.
///
/// Holds only shared handles and configuration, so one instance can serve
/// concurrent requests. Each request works on its own snapshot of the
/// gallery and pool; concurrent requests may both create a record for the
/// same person, which the batch cleanup later collapses.
pub struct IdentifyFacesUseCase {
    detector: Arc<dyn FaceDetector>,
    store: Arc<dyn FaceStore>,
    images: Arc<dyn ImageStore>,
    hasher: Arc<dyn ImageHasher>,
    config: EngineConfig,
}

/// Per-request working state.
struct Request<'a> {
    image_bytes: &'a [u8],
    now: DateTime<Utc>,
    known: Vec<KnownIdentity>,
    unassigned: Vec<UnassignedFace>,
    recent_hashed: Option<Vec<UnassignedFace>>,
    image_hash: Option<PerceptualHash>,
}

impl IdentifyFacesUseCase {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        store: Arc<dyn FaceStore>,
        images: Arc<dyn ImageStore>,
        hasher: Arc<dyn ImageHasher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            detector,
            store,
            images,
            hasher,
            config,
        }
    }

    /// Detects faces in `image_bytes` and classifies each in detector order.
    ///
    /// Faces created earlier in the request are visible to later faces. Read
    /// failures and record creation failures abort the request; failures of
    /// later side effects are attached to the affected face instead.
    ///
    /// Every face in one image shares that image's hash. When the embedding
    /// matches fail, several unknown people in one frame therefore collapse
    /// onto the first record created for that frame (hash distance 0).
    pub fn execute(
        &self,
        image_bytes: &[u8],
        logger: &mut dyn PipelineLogger,
    ) -> Result<IdentifyOutcome, IdentifyError> {
        let t0 = Instant::now();
        let detected = self
            .detector
            .detect(image_bytes)
            .map_err(IdentifyError::Detect)?;
        logger.timing("detect", elapsed_ms(t0));
        log::debug!("Detected {} face(s)", detected.len());

        let mut outcome = IdentifyOutcome::default();
        if detected.is_empty() {
            return Ok(outcome);
        }

        let mut req = Request {
            image_bytes,
            now: Utc::now(),
            known: self
                .store
                .load_known_identities()
                .map_err(IdentifyError::Store)?,
            unassigned: self
                .store
                .load_unassigned_faces(&UnassignedFilter::all())
                .map_err(IdentifyError::Store)?,
            recent_hashed: None,
            image_hash: None,
        };

        for face in detected {
            if face.detection_score < self.config.min_detection_score {
                log::debug!(
                    "Skipping face with detection score {:.3} below {:.3}",
                    face.detection_score,
                    self.config.min_detection_score
                );
                outcome.skipped.push(SkippedFace {
                    bbox: face.bbox,
                    detection_score: face.detection_score,
                });
                continue;
            }
            let identified = self.classify(&face, &mut req, logger)?;
            logger.count(identified.classification.label());
            outcome.faces.push(identified);
        }
        Ok(outcome)
    }

    fn classify(
        &self,
        face: &DetectedFace,
        req: &mut Request<'_>,
        logger: &mut dyn PipelineLogger,
    ) -> Result<IdentifiedFace, IdentifyError> {
        let t0 = Instant::now();
        let known_match = best_match(
            &face.embedding,
            req.known.iter().map(|k| (k, &k.embedding)),
        )?;
        logger.timing("match", elapsed_ms(t0));

        if let Some(Match { key: identity, score }) = &known_match {
            if *score > self.config.known_threshold {
                log::debug!(
                    "Known owner {} (identity {}, score {score:.3})",
                    identity.owner_id,
                    identity.id
                );
                let mut failures = Vec::new();
                let entry = AttendanceEntry::new(identity.owner_id.clone(), *score, req.now);
                if let Err(e) = self.store.append_attendance(&entry) {
                    failures.push(failure(PersistenceStep::Attendance, e));
                }
                return Ok(IdentifiedFace {
                    bbox: face.bbox,
                    detection_score: face.detection_score,
                    classification: Classification::Known {
                        owner_id: identity.owner_id.clone(),
                        identity_id: identity.id.clone(),
                    },
                    basis: MatchBasis::Embedding,
                    score: Some(*score),
                    persistence_failures: failures,
                });
            }
        }
        let best_known_score = known_match.map(|m| m.score);

        let t0 = Instant::now();
        let unassigned_match = best_match(
            &face.embedding,
            req.unassigned.iter().map(|u| (u.id.as_str(), &u.embedding)),
        )?;
        logger.timing("match", elapsed_ms(t0));

        if let Some(m) = unassigned_match {
            if m.score > self.config.unknown_threshold {
                log::debug!("Reusing unassigned face {} (score {:.3})", m.key, m.score);
                return Ok(IdentifiedFace {
                    bbox: face.bbox,
                    detection_score: face.detection_score,
                    classification: Classification::UnknownReused {
                        record_id: m.key.to_string(),
                    },
                    basis: MatchBasis::Embedding,
                    score: Some(m.score),
                    persistence_failures: Vec::new(),
                });
            }
        }

        let hash = self.image_hash(req, logger);
        let now = req.now;
        let recent = self.recent_hashed(req)?;
        let duplicate = find_duplicate(
            &hash,
            recent,
            self.config.dedup_window(),
            now,
            self.config.phash_threshold,
        );
        if let Some(dup) = duplicate {
            let distance = dup
                .perceptual_hash
                .as_ref()
                .and_then(|h| hash.distance_to(h))
                .unwrap_or_default();
            log::debug!("Reusing unassigned face {} by image hash (distance {distance})", dup.id);
            return Ok(IdentifiedFace {
                bbox: face.bbox,
                detection_score: face.detection_score,
                classification: Classification::UnknownReused {
                    record_id: dup.id.clone(),
                },
                basis: MatchBasis::PerceptualHash { distance },
                score: None,
                persistence_failures: Vec::new(),
            });
        }

        let t0 = Instant::now();
        let (record, failures) = self.create_unassigned(face, &hash, req)?;
        logger.timing("persist", elapsed_ms(t0));
        log::info!("Created unassigned face {}", record.id);

        let record_id = record.id.clone();
        if let Some(recent) = req.recent_hashed.as_mut() {
            recent.push(record.clone());
        }
        req.unassigned.push(record);

        Ok(IdentifiedFace {
            bbox: face.bbox,
            detection_score: face.detection_score,
            classification: Classification::UnknownNew { record_id },
            basis: MatchBasis::Embedding,
            score: best_known_score,
            persistence_failures: failures,
        })
    }

    /// Hashes the request image on first use.
    fn image_hash(&self, req: &mut Request<'_>, logger: &mut dyn PipelineLogger) -> PerceptualHash {
        if let Some(hash) = &req.image_hash {
            return hash.clone();
        }
        let t0 = Instant::now();
        let hash = self.hasher.hash(req.image_bytes);
        logger.timing("hash", elapsed_ms(t0));
        if hash.is_degraded() {
            log::warn!("Image hash degraded to checksum {hash}; hash dedup disabled for this image");
        }
        req.image_hash = Some(hash.clone());
        hash
    }

    /// Loads the hashed records inside the dedup window on first use.
    fn recent_hashed<'r>(&self, req: &'r mut Request<'_>) -> Result<&'r [UnassignedFace], IdentifyError> {
        if req.recent_hashed.is_none() {
            let since = req.now - self.config.dedup_window();
            let recent = self
                .store
                .load_unassigned_faces(&UnassignedFilter::recent_with_hash(since))
                .map_err(IdentifyError::Store)?;
            req.recent_hashed = Some(recent);
        }
        Ok(req.recent_hashed.as_deref().unwrap_or_default())
    }

    fn create_unassigned(
        &self,
        face: &DetectedFace,
        hash: &PerceptualHash,
        req: &Request<'_>,
    ) -> Result<(UnassignedFace, Vec<PersistenceFailure>), IdentifyError> {
        let mut record = self
            .store
            .create_unassigned_face(&face.embedding, Some(hash))
            .map_err(IdentifyError::Store)?;
        let mut failures = Vec::new();

        match self.images.store(req.image_bytes, &face.bbox, &record.id) {
            Ok(image_ref) => {
                let update = UnassignedFaceUpdate::image_ref(image_ref.clone());
                match self.store.update_unassigned_face(&record.id, &update) {
                    Ok(true) => record.image_ref = Some(image_ref),
                    Ok(false) => failures.push(failure(
                        PersistenceStep::AttachImage,
                        format!("record {} vanished before its image was attached", record.id).into(),
                    )),
                    Err(e) => failures.push(failure(PersistenceStep::AttachImage, e)),
                }
            }
            Err(e) => failures.push(failure(PersistenceStep::StoreImage, e)),
        }
        Ok((record, failures))
    }
}

fn failure(step: PersistenceStep, error: BoxError) -> PersistenceFailure {
    log::warn!("{step:?} failed: {error}");
    PersistenceFailure {
        step,
        message: error.to_string(),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
