//! HTTP client wrapper for fetching images to disk.
//!
//! This module provides the `HttpClient` struct which streams one URL to one
//! destination path under a hard timeout, skipping the transfer when the file
//! on disk already has the size the server reports.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::ProgressBar;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client for image downloads.
///
/// Created once per run and cloned into each download task; clones share the
/// underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// What a successful fetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The body was transferred and written to the destination.
    Downloaded {
        /// Bytes written.
        bytes: u64,
    },
    /// The destination already held a file of the advertised size.
    Skipped {
        /// Size of the existing file.
        bytes: u64,
    },
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// Only the connect timeout is set on the client; the overall per-image
    /// deadline is applied by [`fetch_to_path`](Self::fetch_to_path).
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot initialise.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` into `dest` within `timeout`.
    ///
    /// If `dest` exists, a HEAD request is sent first; a 2xx response whose
    /// `Content-Length` equals the file size means the image is already on
    /// disk and no GET is made. Otherwise the body is streamed into `dest`
    /// (truncating it).
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid or not HTTP(S)
    /// - The request fails or the timeout elapses
    /// - The server returns a non-2xx status
    /// - Writing to disk fails
    /// - Fewer bytes arrive than the server declared
    pub async fn fetch_to_path(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<FetchOutcome, DownloadError> {
        self.fetch_with_progress(url, dest, timeout, None).await
    }

    /// Same as [`fetch_to_path`](Self::fetch_to_path), reporting body bytes on `progress`.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`fetch_to_path`](Self::fetch_to_path).
    #[instrument(skip(self, progress), fields(url = %url, dest = %dest.display()))]
    pub async fn fetch_with_progress(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
        progress: Option<ProgressBar>,
    ) -> Result<FetchOutcome, DownloadError> {
        match tokio::time::timeout(timeout, self.fetch_inner(url, dest, progress.as_ref())).await {
            Ok(result) => result,
            Err(_) => Err(DownloadError::timeout(url)),
        }
    }

    async fn fetch_inner(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressBar>,
    ) -> Result<FetchOutcome, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        if let Ok(meta) = tokio::fs::metadata(dest).await
            && meta.is_file()
        {
            let existing = meta.len();
            let remote = self.remote_length(url).await;
            if remote == Some(existing) {
                debug!(bytes = existing, "destination already complete, skipping");
                return Ok(FetchOutcome::Skipped { bytes: existing });
            }
            debug!(existing, ?remote, "destination size differs, refetching");
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let declared = declared_length(response.headers());
        if let Some(bar) = progress {
            bar.set_length(declared.unwrap_or(0));
        }

        let mut file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;
        let written = stream_to_file(&mut file, response, url, dest, progress).await?;
        verify_length(dest, declared, written)?;

        debug!(bytes = written, "download complete");
        Ok(FetchOutcome::Downloaded { bytes: written })
    }

    /// Size the server advertises for `url`, if a HEAD request succeeds.
    async fn remote_length(&self, url: &str) -> Option<u64> {
        match self.client.head(url).send().await {
            Ok(response) if response.status().is_success() => declared_length(response.headers()),
            Ok(response) => {
                debug!(status = response.status().as_u16(), "HEAD request rejected");
                None
            }
            Err(e) => {
                debug!(error = %e, "HEAD request failed");
                None
            }
        }
    }
}

fn send_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

/// Reads `Content-Length` from the headers.
///
/// `Response::content_length` is not used because it reflects the body size
/// hint, which is zero for HEAD responses.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Fails when fewer bytes were written than the server declared.
fn verify_length(dest: &Path, declared: Option<u64>, written: u64) -> Result<(), DownloadError> {
    match declared {
        Some(expected) if written < expected => {
            Err(DownloadError::integrity(dest, expected, written))
        }
        _ => Ok(()),
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    progress: Option<&ProgressBar>,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| send_error(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
        if let Some(bar) = progress {
            bar.inc(chunk.len() as u64);
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_declared_length_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1234"));
        assert_eq!(declared_length(&headers), Some(1234));
    }

    #[test]
    fn test_declared_length_missing_or_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(declared_length(&headers), None);
    }

    #[test]
    fn test_verify_length_short_read_is_integrity_error() {
        let result = verify_length(Path::new("images/a.png"), Some(100), 40);
        match result {
            Err(DownloadError::Integrity {
                expected_bytes,
                actual_bytes,
                ..
            }) => {
                assert_eq!(expected_bytes, 100);
                assert_eq!(actual_bytes, 40);
            }
            other => panic!("expected Integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_length_accepts_complete_or_undeclared() {
        assert!(verify_length(Path::new("a"), Some(100), 100).is_ok());
        assert!(verify_length(Path::new("a"), Some(100), 120).is_ok());
        assert!(verify_length(Path::new("a"), None, 0).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_scheme() {
        let client = HttpClient::new().unwrap();
        let temp = tempfile::TempDir::new().unwrap();
        let result = client
            .fetch_to_path(
                "ftp://example.com/a.png",
                &temp.path().join("a.png"),
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
