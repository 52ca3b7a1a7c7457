use std::path::{Path, PathBuf};

use chromiumoxide::error::CdpError;
use thiserror::Error;

/// Errors surfaced by the harvesting pipeline and the exporters
#[derive(Error, Debug)]
pub enum HarvestError {
    /// A DOM capability call failed or the element was absent
    #[error("DOM error: {0}")]
    Dom(String),

    #[error("Results feed not found (selector '{selector}', waited {waited_ms}ms)")]
    FeedNotFound { selector: String, waited_ms: u128 },

    #[error("No data to save")]
    EmptyResultSet,

    #[error("Cannot write {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("A harvest is already running")]
    HarvestInProgress,

    #[error("Export failed: {0}")]
    Export(String),
}

pub type HarvestResult<T> = Result<T, HarvestError>;

impl HarvestError {
    pub(crate) fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        HarvestError::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

impl From<CdpError> for HarvestError {
    fn from(err: CdpError) -> Self {
        HarvestError::Dom(err.to_string())
    }
}
