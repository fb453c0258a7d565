/// DCT perceptual hash ("pHash") over encoded image bytes.
///
/// Decode -> 32x32 triangle resize -> luminance -> 2-D DCT -> compare the
/// 63 low-frequency AC coefficients against their median -> 16 hex chars.
/// Undecodable input degrades to a BLAKE3 checksum tagged as such.
use image::imageops::FilterType;
use ndarray::Array2;
use thiserror::Error;

use crate::hashing::domain::image_hasher::ImageHasher;
use crate::hashing::domain::perceptual_hash::PerceptualHash;
use crate::hashing::infrastructure::dct::dct_2d;

/// Side of the luminance grid fed to the DCT.
pub const HASH_GRID_SIZE: usize = 32;

/// Side of the low-frequency block the bits are taken from.
pub const LOW_FREQ_SIZE: usize = 8;

/// Length of every hash this module produces.
pub const HASH_HEX_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("DCT produced a non-finite coefficient")]
    NonFinite,
}

/// Hashes an image, never failing.
pub fn compute_hash(image_bytes: &[u8]) -> PerceptualHash {
    match dct_hash(image_bytes) {
        Ok(value) => PerceptualHash::dct(value),
        Err(e) => {
            log::warn!("Perceptual hash unavailable ({e}); using content checksum");
            PerceptualHash::checksum(checksum_hex(image_bytes))
        }
    }
}

/// Strict variant of [`compute_hash`] that reports why hashing failed.
pub fn dct_hash(image_bytes: &[u8]) -> Result<String, HashError> {
    let grid = HASH_GRID_SIZE as u32;
    let luma = image::load_from_memory(image_bytes)?
        .resize_exact(grid, grid, FilterType::Triangle)
        .to_luma8();

    let pixels = Array2::from_shape_fn((HASH_GRID_SIZE, HASH_GRID_SIZE), |(row, col)| {
        luma.get_pixel(col as u32, row as u32)[0] as f64
    });
    let coeffs = dct_2d(&pixels);

    // Row-major over the 8x8 block, DC term skipped.
    let block: Vec<f64> = (0..LOW_FREQ_SIZE)
        .flat_map(|u| (0..LOW_FREQ_SIZE).map(move |v| (u, v)))
        .filter(|&uv| uv != (0, 0))
        .map(|(u, v)| coeffs[[u, v]])
        .collect();
    if block.iter().any(|c| !c.is_finite()) {
        return Err(HashError::NonFinite);
    }

    let median = median(&block);
    let bits: Vec<bool> = block.iter().map(|&c| c > median).collect();
    Ok(pack_hex(&bits))
}

/// Upper median (index `len / 2` after sorting); the true median for the
/// odd-length coefficient block.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[sorted.len() / 2]
}

/// Packs bits MSB-first into lowercase hex nibbles.
///
/// A trailing group shorter than four bits is read as a plain number,
/// i.e. zero-padded on its high side: 63 bits give 16 characters.
fn pack_hex(bits: &[bool]) -> String {
    bits.chunks(4)
        .map(|chunk| {
            let nibble = chunk.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32);
            char::from_digit(nibble, 16).unwrap_or('0')
        })
        .collect()
}

fn checksum_hex(bytes: &[u8]) -> String {
    let digest = blake3::hash(bytes).to_hex();
    digest.as_str()[..HASH_HEX_LEN].to_string()
}

/// [`ImageHasher`] backed by [`compute_hash`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DctImageHasher;

impl DctImageHasher {
    pub fn new() -> Self {
        Self
    }
}

impl ImageHasher for DctImageHasher {
    fn hash(&self, image_bytes: &[u8]) -> PerceptualHash {
        compute_hash(image_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::domain::perceptual_hash::{
        are_similar, hamming_distance, HashSource, DEFAULT_PHASH_THRESHOLD,
    };
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    // --- Helpers ---

    /// Deterministic generator so test images are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next_u32(&mut self) -> u32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 33) as u32
        }

        fn next_u8(&mut self) -> u8 {
            (self.next_u32() & 0xff) as u8
        }

        fn below(&mut self, n: u32) -> u32 {
            self.next_u32() % n
        }
    }

    fn noise_image(seed: u64, w: u32, h: u32) -> RgbImage {
        let mut rng = Lcg(seed);
        RgbImage::from_fn(w, h, |_, _| Rgb([rng.next_u8(), rng.next_u8(), rng.next_u8()]))
    }

    /// Nudges the red channel of 5% of the pixels by up to +-10.
    fn add_noise(img: &RgbImage, seed: u64) -> RgbImage {
        let mut rng = Lcg(seed);
        let mut out = img.clone();
        let count = (img.width() * img.height()) / 20;
        for _ in 0..count {
            let x = rng.below(img.width());
            let y = rng.below(img.height());
            let delta = rng.below(21) as i32 - 10;
            let px = out.get_pixel_mut(x, y);
            px[0] = (px[0] as i32 + delta).clamp(0, 255) as u8;
        }
        out
    }

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    // --- Bit packing ---

    #[test]
    fn test_pack_hex_all_ones_63_bits() {
        assert_eq!(pack_hex(&[true; 63]), "fffffffffffffff7");
    }

    #[test]
    fn test_pack_hex_all_zeros_63_bits() {
        assert_eq!(pack_hex(&[false; 63]), "0000000000000000");
    }

    #[test]
    fn test_pack_hex_msb_first() {
        assert_eq!(pack_hex(&[true, false, false, false, false, false, false, true]), "81");
    }

    #[test]
    fn test_median_of_odd_length() {
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
        let values: Vec<f64> = (0..63).rev().map(f64::from).collect();
        assert_eq!(median(&values), 31.0);
    }

    // --- Hashing ---

    #[test]
    fn test_hash_is_16_hex_chars() {
        let bytes = encode_png(&noise_image(1, 64, 64));
        let h = compute_hash(&bytes);
        assert_eq!(h.source(), HashSource::Dct);
        assert_eq!(h.as_str().len(), HASH_HEX_LEN);
        assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_is_idempotent() {
        let bytes = encode_png(&noise_image(7, 120, 90));
        assert_eq!(compute_hash(&bytes), compute_hash(&bytes));
    }

    #[test]
    fn test_hash_has_31_bits_above_median() {
        // Noise gives distinct coefficients, so exactly 31 of 63 exceed the median.
        let value = dct_hash(&encode_png(&noise_image(3, 100, 100))).unwrap();
        let ones: u32 = value.chars().map(|c| c.to_digit(16).unwrap().count_ones()).sum();
        assert_eq!(ones, 31);
    }

    #[test]
    fn test_constant_image_still_hashes() {
        let img = RgbImage::from_pixel(50, 50, Rgb([128, 128, 128]));
        let h = compute_hash(&encode_png(&img));
        assert_eq!(h.source(), HashSource::Dct);
        assert_eq!(h.as_str().len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_undecodable_bytes_fall_back_to_checksum() {
        let bytes = b"definitely not an image";
        let h = compute_hash(bytes);
        assert!(h.is_degraded());
        assert_eq!(h.as_str().len(), HASH_HEX_LEN);
        assert_eq!(h, compute_hash(bytes));
        assert!(matches!(dct_hash(bytes), Err(HashError::Decode(_))));
    }

    #[test]
    fn test_checksum_differs_per_content() {
        assert_ne!(compute_hash(b"abc"), compute_hash(b"abd"));
    }

    #[test]
    fn test_near_duplicate_frames_are_similar() {
        let base = noise_image(42, 200, 200);
        let noisy = add_noise(&base, 99);
        let h1 = compute_hash(&encode_png(&base));
        let h2 = compute_hash(&encode_png(&noisy));
        let d = hamming_distance(h1.as_str(), h2.as_str()).unwrap();
        assert!(d <= DEFAULT_PHASH_THRESHOLD, "near-duplicate distance {d}");
        assert!(h1.is_similar_to(&h2, DEFAULT_PHASH_THRESHOLD));
    }

    #[test]
    fn test_unrelated_images_are_not_similar() {
        let h1 = compute_hash(&encode_png(&noise_image(42, 200, 200)));
        let h3 = compute_hash(&encode_png(&noise_image(1234, 200, 200)));
        let d = hamming_distance(h1.as_str(), h3.as_str()).unwrap();
        assert!(d > DEFAULT_PHASH_THRESHOLD, "unrelated distance {d}");
        assert!(!are_similar(h1.as_str(), h3.as_str(), DEFAULT_PHASH_THRESHOLD));
    }

    #[test]
    fn test_hasher_trait_delegates() {
        let bytes = encode_png(&noise_image(5, 40, 40));
        assert_eq!(DctImageHasher::new().hash(&bytes), compute_hash(&bytes));
    }
}
