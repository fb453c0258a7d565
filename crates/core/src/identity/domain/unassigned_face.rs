use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hashing::domain::perceptual_hash::PerceptualHash;
use crate::shared::embedding::Embedding;

/// A face seen at the kiosk that is not yet linked to an owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnassignedFace {
    pub id: String,
    pub embedding: Embedding,
    #[serde(default)]
    pub perceptual_hash: Option<PerceptualHash>,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Selection applied by the store when loading the unassigned pool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnassignedFilter {
    /// Only records created at or after this instant.
    pub created_since: Option<DateTime<Utc>>,
    /// Only records carrying a perceptual hash.
    pub with_hash_only: bool,
}

impl UnassignedFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn recent_with_hash(since: DateTime<Utc>) -> Self {
        Self {
            created_since: Some(since),
            with_hash_only: true,
        }
    }

    pub fn matches(&self, face: &UnassignedFace) -> bool {
        let recent = self.created_since.map_or(true, |since| face.created_at >= since);
        let hashed = !self.with_hash_only || face.perceptual_hash.is_some();
        recent && hashed
    }
}

/// Fields of an unassigned record that may change after creation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnassignedFaceUpdate {
    pub image_ref: Option<String>,
}

impl UnassignedFaceUpdate {
    pub fn image_ref(image_ref: impl Into<String>) -> Self {
        Self {
            image_ref: Some(image_ref.into()),
        }
    }
}
