use serde::Serialize;

use crate::shared::bounding_box::BoundingBox;

/// Terminal state of one detected face.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// Matched an enrolled identity.
    Known { owner_id: String, identity_id: String },
    /// Matched an existing unassigned record; nothing was created.
    UnknownReused { record_id: String },
    /// A new unassigned record was created.
    UnknownNew { record_id: String },
}

impl Classification {
    /// Stable name used for counters and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Known { .. } => "known",
            Self::UnknownReused { .. } => "unknown_reused",
            Self::UnknownNew { .. } => "unknown_new",
        }
    }
}

/// What decided the classification.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchBasis {
    Embedding,
    PerceptualHash { distance: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceStep {
    Attendance,
    StoreImage,
    AttachImage,
}

/// A side effect that failed after the face was already classified.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersistenceFailure {
    pub step: PersistenceStep,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdentifiedFace {
    pub bbox: BoundingBox,
    pub detection_score: f64,
    pub classification: Classification,
    pub basis: MatchBasis,
    /// Embedding similarity behind the decision. Absent for hash-based
    /// reuse, and for a new record when the known gallery was empty.
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persistence_failures: Vec<PersistenceFailure>,
}

impl IdentifiedFace {
    pub fn is_degraded(&self) -> bool {
        !self.persistence_failures.is_empty()
    }
}

/// A face below the detection score floor; not classified.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedFace {
    pub bbox: BoundingBox,
    pub detection_score: f64,
}

/// Per-image result, faces in detector order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IdentifyOutcome {
    pub faces: Vec<IdentifiedFace>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFace>,
}

impl IdentifyOutcome {
    pub fn known_owners(&self) -> impl Iterator<Item = &str> {
        self.faces.iter().filter_map(|f| match &f.classification {
            Classification::Known { owner_id, .. } => Some(owner_id.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(classification: Classification) -> IdentifiedFace {
        IdentifiedFace {
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            detection_score: 0.9,
            classification,
            basis: MatchBasis::Embedding,
            score: Some(0.8),
            persistence_failures: Vec::new(),
        }
    }

    #[test]
    fn test_known_owners_filters_known_faces() {
        let outcome = IdentifyOutcome {
            faces: vec![
                face(Classification::Known {
                    owner_id: "emp-1".into(),
                    identity_id: "k1".into(),
                }),
                face(Classification::UnknownNew {
                    record_id: "u1".into(),
                }),
            ],
            skipped: Vec::new(),
        };
        assert_eq!(outcome.known_owners().collect::<Vec<_>>(), vec!["emp-1"]);
    }

    #[test]
    fn test_json_shape() {
        let mut f = face(Classification::UnknownReused {
            record_id: "u9".into(),
        });
        f.basis = MatchBasis::PerceptualHash { distance: 4 };
        f.score = None;
        let json = serde_json::to_value(&f).unwrap();

        assert_eq!(json["classification"]["kind"], "unknown_reused");
        assert_eq!(json["classification"]["record_id"], "u9");
        assert_eq!(json["basis"]["type"], "perceptual_hash");
        assert_eq!(json["basis"]["distance"], 4);
        assert!(json["score"].is_null());
        assert!(json.get("persistence_failures").is_none());
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            Classification::UnknownNew {
                record_id: String::new()
            }
            .label(),
            "unknown_new"
        );
    }
}
