//! Error types for the install pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for depot operations.
///
/// Stages are fail-fast: the first error from any concurrent unit is
/// propagated to the caller verbatim, never wrapped or aggregated.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("no manifest found at {}", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("invalid manifest at {}: {message}", path.display())]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("failed to resolve '{name}': {message}")]
    Resolution { name: String, message: String },

    #[error("failed to fetch {name}@{version}: {message}")]
    Fetch {
        name: String,
        version: String,
        message: String,
    },

    #[error("failed to publish {} to {}: {message}", src.display(), dst.display())]
    Publish {
        src: PathBuf,
        dst: PathBuf,
        message: String,
    },

    #[error("copy from {} to {} failed: {message}", src.display(), dst.display())]
    Copy {
        src: PathBuf,
        dst: PathBuf,
        message: String,
    },

    #[error("failed to clean up {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a resolution error for a package name.
    pub fn resolution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a fetch error for a package version.
    pub fn fetch(
        name: impl Into<String>,
        version: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Fetch {
            name: name.into(),
            version: version.into(),
            message: message.into(),
        }
    }

    /// Create a publish error.
    pub fn publish(
        src: &std::path::Path,
        dst: &std::path::Path,
        message: impl Into<String>,
    ) -> Self {
        Self::Publish {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a copy error.
    pub fn copy(src: &std::path::Path, dst: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Copy {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            message: message.into(),
        }
    }
}
