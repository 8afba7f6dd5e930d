//! Error types for image reference resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Why an `<img>` source could not be mapped to a file on disk.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Remote source with no successful download this run.
    #[error("remote image {src} was not downloaded")]
    NotDownloaded {
        /// The `src` attribute value.
        src: String,
    },

    /// Local source not found under any lookup convention.
    #[error("local image {src} not found ({} location(s) tried)", tried.len())]
    NotFound {
        /// The `src` attribute value.
        src: String,
        /// Every candidate path checked, in order.
        tried: Vec<PathBuf>,
    },
}

impl ResolveError {
    /// Creates a not-downloaded error.
    pub fn not_downloaded(src: impl Into<String>) -> Self {
        Self::NotDownloaded { src: src.into() }
    }

    /// Creates a not-found error with the candidates that were checked.
    pub fn not_found(src: impl Into<String>, tried: Vec<PathBuf>) -> Self {
        Self::NotFound {
            src: src.into(),
            tried,
        }
    }
}
