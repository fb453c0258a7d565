use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::embedding::Embedding;

/// Enrolled reference embedding for an owner (employee).
///
/// An owner may have several identities, one per reference photo.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnownIdentity {
    pub id: String,
    pub owner_id: String,
    pub embedding: Embedding,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
