//! Mapping of `<img>` sources to files on disk.
//!
//! A source is one of three kinds:
//!
//! - [`SourceKind::Inline`] - a `data:` URI; it renders as is and is never embedded
//! - [`SourceKind::Remote`] - an `http(s)` URL; it maps to its staged download
//! - [`SourceKind::Local`] - anything else; see [`resolve_local`] for the lookup order

mod error;
mod local;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use error::ResolveError;
pub use local::{LocalStrategy, STRATEGIES, resolve_local};

/// Shape of an image source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `data:` URI.
    Inline,
    /// Starts with `http`.
    Remote,
    /// Path-like reference.
    Local,
}

impl SourceKind {
    /// Classifies a raw `src` attribute value.
    #[must_use]
    pub fn of(src: &str) -> Self {
        if src.starts_with("data:") {
            Self::Inline
        } else if src.starts_with("http") {
            Self::Remote
        } else {
            Self::Local
        }
    }
}

/// Resolves a non-inline `src` to a local file.
///
/// Remote sources are looked up in `downloads` (the coordinator's result for
/// the current document); local sources go through [`resolve_local`].
///
/// # Errors
///
/// Returns [`ResolveError::NotDownloaded`] for a remote source missing from
/// `downloads` and [`ResolveError::NotFound`] for an unlocatable local one.
pub fn resolve(
    document: &Path,
    src: &str,
    downloads: &HashMap<String, PathBuf>,
) -> Result<PathBuf, ResolveError> {
    match SourceKind::of(src) {
        SourceKind::Remote => downloads
            .get(src)
            .cloned()
            .ok_or_else(|| ResolveError::not_downloaded(src)),
        SourceKind::Inline | SourceKind::Local => resolve_local(document, src),
    }
}
