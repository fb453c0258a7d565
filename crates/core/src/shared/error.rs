use std::path::PathBuf;

use thiserror::Error;

/// Error type crossing collaborator seams (detector, stores, hasher).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the bundled file-backed adapters.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt record file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize records: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("invalid image reference: {0}")]
    InvalidReference(String),
    #[error("store lock poisoned")]
    Poisoned,
}
