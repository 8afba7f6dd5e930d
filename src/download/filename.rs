//! Deterministic staging paths for remote images.
//!
//! A URL always maps to the same file under the images directory, so a second
//! run finds its earlier download and the HEAD size check can skip it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use url::Url;

use super::error::DownloadError;

/// Number of digest bytes kept in staging filenames (128 bits).
const DIGEST_BYTES: usize = 16;

/// Builds `images_dir/<digest(url)><ext>` for a remote image URL.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] when `url` does not parse.
pub fn staging_path(images_dir: &Path, url: &str) -> Result<PathBuf, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    let extension = extension_from_url(&parsed).unwrap_or_default();
    Ok(images_dir.join(format!("{}{extension}", url_digest(url))))
}

/// Hex digest of the URL string, truncated to 128 bits.
pub(crate) fn url_digest(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest
        .iter()
        .take(DIGEST_BYTES)
        .fold(String::with_capacity(DIGEST_BYTES * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Extension (with leading dot) of the last URL path segment, if plausible.
pub(crate) fn extension_from_url(url: &Url) -> Option<String> {
    let last_segment = url.path_segments()?.next_back()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index..];
    if ext.len() <= 1 || ext.len() > 12 {
        return None;
    }
    if !ext[1..].chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_string())
}
