use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Face identity vector produced by the external embedding model.
///
/// The model emits L2-normalized vectors, so a plain dot product behaves
/// like cosine similarity. Serialized as a bare JSON array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Best-scoring candidate returned by [`best_match`].
#[derive(Clone, Debug, PartialEq)]
pub struct Match<K> {
    pub key: K,
    pub score: f64,
}

/// Dot product of two embeddings, accumulated in `f64`.
///
/// Not cosine-normalized: callers rely on the model producing unit-norm
/// vectors.
pub fn similarity(a: &Embedding, b: &Embedding) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.0
        .iter()
        .zip(b.0.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum())
}

/// Linear scan for the highest-scoring candidate.
///
/// Ties keep the first candidate in iteration order. Returns `Ok(None)` for
/// an empty candidate sequence. This is the single place a nearest-neighbor
/// index would replace the O(n) scan.
pub fn best_match<'a, K, I>(query: &Embedding, candidates: I) -> Result<Option<Match<K>>, EmbeddingError>
where
    I: IntoIterator<Item = (K, &'a Embedding)>,
{
    let mut best: Option<Match<K>> = None;
    for (key, candidate) in candidates {
        let score = similarity(query, candidate)?;
        let better = best.as_ref().map_or(true, |b| score > b.score);
        if better {
            best = Some(Match { key, score });
        }
    }
    Ok(best)
}
