//! Why an image could not be staged.
//!
//! A fetch error never aborts a conversion. The coordinator logs it, records
//! the URL as failed and the `<img>` keeps its original `src`, so each variant
//! names the image URL or the staging path it was written to.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from fetching one image into the staging directory.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The GET request or its body stream failed below HTTP.
    ///
    /// A failed HEAD size check is not an error; it only disables the skip.
    #[error("cannot fetch image {url}: {source}")]
    Network {
        /// Image URL.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The whole fetch, HEAD request included, ran past its deadline.
    #[error("image fetch timed out: {url}")]
    Timeout {
        /// Image URL.
        url: String,
    },

    /// The image server answered the GET with a non-2xx status.
    #[error("HTTP {status} fetching image {url}")]
    HttpStatus {
        /// Image URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Creating or writing the staged image failed.
    #[error("cannot write staged image {path}: {source}")]
    Io {
        /// Staging path under the images directory.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `src` does not parse as an http(s) URL.
    #[error("not an http(s) image URL: {url}")]
    InvalidUrl {
        /// The rejected `src`.
        url: String,
    },

    /// The staged image is shorter than the `Content-Length` of the GET.
    #[error(
        "staged image {path} is truncated: server declared {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Staging path under the images directory.
        path: PathBuf,
        /// Declared length.
        expected_bytes: u64,
        /// Bytes written to the staging path.
        actual_bytes: u64,
    },
}

impl DownloadError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::error::Error as _;

    use super::*;

    const STAGED: &str = "images/3f2a9c01d4e5b6a7.png";

    #[test]
    fn test_timeout_names_the_image_url() {
        let error = DownloadError::timeout("https://cdn.example.com/slow.png");
        assert_eq!(
            error.to_string(),
            "image fetch timed out: https://cdn.example.com/slow.png"
        );
    }

    #[test]
    fn test_http_status_from_hotlink_protection() {
        let error = DownloadError::http_status("https://cdn.example.com/a.jpg", 403);
        assert_eq!(
            error.to_string(),
            "HTTP 403 fetching image https://cdn.example.com/a.jpg"
        );
        assert!(error.source().is_none());
    }

    #[test]
    fn test_io_names_staging_path_and_keeps_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full");
        let error = DownloadError::io(STAGED, io_error);

        let msg = error.to_string();
        assert!(msg.starts_with("cannot write staged image images/3f2a9c01d4e5b6a7.png"));
        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "disk full");
    }

    #[test]
    fn test_invalid_url_for_non_http_src() {
        let error = DownloadError::invalid_url("ftp://example.com/a.png");
        assert_eq!(
            error.to_string(),
            "not an http(s) image URL: ftp://example.com/a.png"
        );
    }

    #[test]
    fn test_integrity_reports_declared_and_written_sizes() {
        let error = DownloadError::integrity(STAGED, 2048, 1024);
        assert_eq!(
            error.to_string(),
            "staged image images/3f2a9c01d4e5b6a7.png is truncated: \
             server declared 2048 bytes, got 1024"
        );
    }
}
