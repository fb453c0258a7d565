//! Rules for deciding that an unassigned face repeats one already stored.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::hashing::domain::perceptual_hash::PerceptualHash;
use crate::identity::domain::unassigned_face::UnassignedFace;
use crate::shared::embedding::{similarity, EmbeddingError};

/// First record in `recent` created within `window` of `now` whose DCT hash
/// is within `threshold` bits of `hash`.
///
/// First match wins, not the closest one. A checksum `hash` never matches,
/// nor do records carrying a checksum hash or none at all.
pub fn find_duplicate<'a>(
    hash: &PerceptualHash,
    recent: &'a [UnassignedFace],
    window: Duration,
    now: DateTime<Utc>,
    threshold: u32,
) -> Option<&'a UnassignedFace> {
    if hash.is_degraded() {
        return None;
    }
    let since = now - window;
    recent.iter().find(|face| {
        face.created_at >= since
            && face
                .perceptual_hash
                .as_ref()
                .is_some_and(|h| hash.is_similar_to(h, threshold))
    })
}

/// Record `duplicate_id` repeats the earlier record `kept_id`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DuplicatePair {
    pub duplicate_id: String,
    pub kept_id: String,
    pub similarity: f64,
}

/// Pairs every later record with the earliest unmarked record it repeats.
///
/// Records are ordered by creation time first. For each record not already
/// marked, later records are compared until one falls outside `window`; any
/// with embedding similarity above `threshold` is marked as a duplicate.
/// Marked records never act as the kept side, so three mutually similar
/// records yield one survivor and two pairs.
pub fn find_duplicate_pairs(
    records: &[UnassignedFace],
    window: Duration,
    threshold: f64,
) -> Result<Vec<DuplicatePair>, EmbeddingError> {
    let mut ordered: Vec<&UnassignedFace> = records.iter().collect();
    ordered.sort_by_key(|f| f.created_at);

    let mut marked: HashSet<usize> = HashSet::new();
    let mut pairs = Vec::new();

    for i in 0..ordered.len() {
        if marked.contains(&i) {
            continue;
        }
        let kept = ordered[i];
        for (j, candidate) in ordered.iter().enumerate().skip(i + 1) {
            if candidate.created_at - kept.created_at > window {
                break;
            }
            if marked.contains(&j) {
                continue;
            }
            let score = similarity(&kept.embedding, &candidate.embedding)?;
            if score > threshold {
                marked.insert(j);
                pairs.push(DuplicatePair {
                    duplicate_id: candidate.id.clone(),
                    kept_id: kept.id.clone(),
                    similarity: score,
                });
            }
        }
    }
    Ok(pairs)
}
