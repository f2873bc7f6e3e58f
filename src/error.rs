//! Error types for the chain auditor.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the chain auditor.
///
/// Only [`AuditorError::ProjectRoot`] aborts a scan. Everything else raised while
/// building the corpus is downgraded to a diagnostic for the offending file.
#[derive(Error, Debug)]
pub enum AuditorError {
    #[error("Project root {path} is not readable: {source}")]
    ProjectRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Project root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AuditorError {
    /// Shorthand for a per-file parse failure.
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AuditorError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for auditor operations.
pub type Result<T> = std::result::Result<T, AuditorError>;
