use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BATCH_SIMILARITY_THRESHOLD, DEFAULT_BATCH_WINDOW_SECS,
    DEFAULT_DEDUP_WINDOW_SECS, DEFAULT_ENGINE_URL, DEFAULT_KNOWN_THRESHOLD,
    DEFAULT_PHASH_THRESHOLD, DEFAULT_UNKNOWN_THRESHOLD, MAX_WINDOW_SECS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("could not determine a data directory; pass --data-dir")]
    NoDataDir,
}

/// Tunable engine settings.
///
/// Every field has a default so partial JSON files are valid. Thresholds
/// live here rather than in code because the embedding model decides the
/// useful similarity range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub known_threshold: f64,
    pub unknown_threshold: f64,
    pub phash_threshold: u32,
    pub dedup_window_secs: i64,
    pub batch_similarity_threshold: f64,
    pub batch_window_secs: i64,
    pub min_detection_score: f64,
    pub engine_url: String,
    pub data_dir: Option<PathBuf>,
    pub crop_faces: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            known_threshold: DEFAULT_KNOWN_THRESHOLD,
            unknown_threshold: DEFAULT_UNKNOWN_THRESHOLD,
            phash_threshold: DEFAULT_PHASH_THRESHOLD,
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            batch_similarity_threshold: DEFAULT_BATCH_SIMILARITY_THRESHOLD,
            batch_window_secs: DEFAULT_BATCH_WINDOW_SECS,
            min_detection_score: 0.0,
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            data_dir: None,
            crop_faces: false,
        }
    }
}

impl EngineConfig {
    /// Platform config location, e.g. `~/.config/FaceTrace/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error rather
    /// than a silent reset to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_score("known_threshold", self.known_threshold)?;
        check_score("unknown_threshold", self.unknown_threshold)?;
        check_score("batch_similarity_threshold", self.batch_similarity_threshold)?;
        if !(0.0..=1.0).contains(&self.min_detection_score) {
            return Err(ConfigError::OutOfRange {
                name: "min_detection_score",
                expected: "between 0.0 and 1.0",
                value: self.min_detection_score.to_string(),
            });
        }
        if self.phash_threshold > 64 {
            return Err(ConfigError::OutOfRange {
                name: "phash_threshold",
                expected: "at most 64",
                value: self.phash_threshold.to_string(),
            });
        }
        check_window("dedup_window_secs", self.dedup_window_secs)?;
        check_window("batch_window_secs", self.batch_window_secs)?;
        Ok(())
    }

    /// Clamped to `0..=MAX_WINDOW_SECS` even on an unvalidated config.
    pub fn dedup_window(&self) -> Duration {
        clamped_window(self.dedup_window_secs)
    }

    pub fn batch_window(&self) -> Duration {
        clamped_window(self.batch_window_secs)
    }

    /// Configured data directory, else the platform data dir.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or(ConfigError::NoDataDir)
    }
}

fn check_score(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            expected: "between -1.0 and 1.0",
            value: value.to_string(),
        })
    }
}

fn clamped_window(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(0, MAX_WINDOW_SECS))
}

fn check_window(name: &'static str, secs: i64) -> Result<(), ConfigError> {
    if secs > 0 && secs <= MAX_WINDOW_SECS {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            expected: "between 1 and 604800 seconds",
            value: secs.to_string(),
        })
    }
}
