use crate::hashing::domain::perceptual_hash::PerceptualHash;

/// Domain interface for fingerprinting encoded image bytes.
///
/// Infallible by contract: implementations degrade to a checksum hash
/// instead of returning an error.
pub trait ImageHasher: Send + Sync {
    fn hash(&self, image_bytes: &[u8]) -> PerceptualHash;
}
