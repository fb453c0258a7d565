use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::shared::constants::DEFAULT_PHASH_THRESHOLD;

/// How a [`PerceptualHash`] was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashSource {
    /// DCT fingerprint; bit distance reflects visual similarity.
    Dct,
    /// Content checksum used when the image could not be decoded.
    /// Only keeps the field populated; never compared for similarity.
    Checksum,
}

/// 16-character hex fingerprint of an image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualHash {
    value: String,
    source: HashSource,
}

impl PerceptualHash {
    pub fn dct(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: HashSource::Dct,
        }
    }

    pub fn checksum(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: HashSource::Checksum,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> HashSource {
        self.source
    }

    pub fn is_degraded(&self) -> bool {
        self.source == HashSource::Checksum
    }

    /// Bit distance to `other`, `None` when either side is a checksum or
    /// the strings are incomparable.
    pub fn distance_to(&self, other: &PerceptualHash) -> Option<u32> {
        if self.is_degraded() || other.is_degraded() {
            return None;
        }
        hamming_distance(&self.value, &other.value)
    }

    pub fn is_similar_to(&self, other: &PerceptualHash, threshold: u32) -> bool {
        self.distance_to(other).is_some_and(|d| d <= threshold)
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Number of differing bits between two hex strings.
///
/// Compares nibble by nibble. Returns `None` (incomparable) when the lengths
/// differ or either string holds a non-hex character; never panics.
pub fn hamming_distance(h1: &str, h2: &str) -> Option<u32> {
    if h1.len() != h2.len() {
        return None;
    }
    h1.chars().zip(h2.chars()).try_fold(0u32, |acc, (a, b)| {
        let x = a.to_digit(16)?;
        let y = b.to_digit(16)?;
        Some(acc + (x ^ y).count_ones())
    })
}

/// True iff both hashes are comparable and at most `threshold` bits apart.
pub fn are_similar(h1: &str, h2: &str, threshold: u32) -> bool {
    hamming_distance(h1, h2).is_some_and(|d| d <= threshold)
}
