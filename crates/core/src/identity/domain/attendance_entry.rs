use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Check-in row appended whenever a known owner is recognized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub owner_id: String,
    pub confidence_score: f64,
    pub checked_in_at: DateTime<Utc>,
    #[serde(default)]
    pub snapshot_ref: Option<String>,
}

impl AttendanceEntry {
    pub fn new(owner_id: impl Into<String>, confidence_score: f64, checked_in_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.into(),
            confidence_score,
            checked_in_at,
            snapshot_ref: None,
        }
    }
}
