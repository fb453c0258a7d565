/// Similarity a known-gallery match must exceed (buffalo_l embeddings).
pub const DEFAULT_KNOWN_THRESHOLD: f64 = 0.5;

/// Stricter bar for unassigned faces: one reference sample, never verified.
pub const DEFAULT_UNKNOWN_THRESHOLD: f64 = 0.6;

/// Maximum Hamming distance for two perceptual hashes to count as similar.
pub const DEFAULT_PHASH_THRESHOLD: u32 = 10;

/// How far back the live pipeline looks for near-duplicate frames.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 30;

pub const DEFAULT_BATCH_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_BATCH_WINDOW_SECS: i64 = 5 * 60;

/// Upper bound for either window: one week.
pub const MAX_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

pub const DEFAULT_ENGINE_URL: &str = "http://ai-engine:8000";

pub const DEFAULT_UNASSIGNED_LIMIT: usize = 50;
pub const DEFAULT_ATTENDANCE_LIMIT: usize = 100;

pub const APP_DIR_NAME: &str = "FaceTrace";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const RECORDS_FILE_NAME: &str = "records.json";
pub const FACES_DIR_NAME: &str = "faces";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
