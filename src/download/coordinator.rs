//! Bounded, deduplicated download of the remote images a document references.
//!
//! The `ImageDownloader` lives for the whole conversion run. Each call scans
//! one document's image sources, dispatches every URL not yet attempted in
//! this run to a semaphore-gated pool of Tokio tasks, and waits for all of
//! them before returning.
//!
//! # Example
//!
//! ```no_run
//! use html_to_epub::download::{HttpClient, ImageDownloader};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let mut downloader = ImageDownloader::new(client, Path::new("images"));
//! let local = downloader
//!     .download_all(["https://example.com/a.png", "https://example.com/a.png"])
//!     .await;
//! println!("{} distinct image(s) on disk", local.len());
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::client::{FetchOutcome, HttpClient};
use super::constants::{DOWNLOAD_CONCURRENCY, FETCH_TIMEOUT};
use super::error::DownloadError;
use super::filename::staging_path;
use crate::resolve::SourceKind;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 32;

/// Error type for downloader construction and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Final state of one remote image for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Fetched into the staging path.
    Downloaded,
    /// Already present with the advertised size; not transferred.
    Skipped,
    /// Could not be fetched; the reason is kept for reporting.
    Failed(String),
}

/// One remote image discovered during the run.
#[derive(Debug, Clone)]
pub struct DownloadRecord {
    /// Source URL exactly as written in the `src` attribute.
    pub url: String,
    /// Staging path the URL maps to.
    pub path: PathBuf,
    /// Outcome of the single fetch attempt.
    pub status: DownloadStatus,
}

impl DownloadRecord {
    /// Whether the staging file holds the fetched image.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.status, DownloadStatus::Failed(_))
    }
}

/// Counters over every fetch dispatched in the run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadStats {
    /// Images transferred.
    pub downloaded: usize,
    /// Images already on disk.
    pub skipped: usize,
    /// Images that could not be fetched.
    pub failed: usize,
}

impl DownloadStats {
    /// Total number of URLs attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Run-wide coordinator for remote image downloads.
///
/// # Concurrency Model
///
/// - Each distinct URL runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task
/// - Permits are released when the task finishes (RAII)
/// - [`download_all`](Self::download_all) joins every task before returning
///
/// # Deduplication
///
/// A URL gets a [`DownloadRecord`] the first time it is seen, success or not,
/// and is never dispatched again during the run.
#[derive(Debug)]
pub struct ImageDownloader {
    client: HttpClient,
    images_dir: PathBuf,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    timeout: Duration,
    records: HashMap<String, DownloadRecord>,
    stats: DownloadStats,
    progress: Option<MultiProgress>,
}

impl ImageDownloader {
    /// Creates a downloader with the default limits (3 in flight, 2 minute timeout).
    #[must_use]
    pub fn new(client: HttpClient, images_dir: &Path) -> Self {
        Self::build(client, images_dir, DOWNLOAD_CONCURRENCY, FETCH_TIMEOUT)
    }

    /// Creates a downloader with explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidConcurrency`] if `concurrency` is
    /// outside 1..=32.
    #[instrument(level = "debug", skip(client))]
    pub fn with_limits(
        client: HttpClient,
        images_dir: &Path,
        concurrency: usize,
        timeout: Duration,
    ) -> Result<Self, CoordinatorError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(CoordinatorError::InvalidConcurrency { value: concurrency });
        }
        Ok(Self::build(client, images_dir, concurrency, timeout))
    }

    fn build(client: HttpClient, images_dir: &Path, concurrency: usize, timeout: Duration) -> Self {
        Self {
            client,
            images_dir: images_dir.to_path_buf(),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            timeout,
            records: HashMap::new(),
            stats: DownloadStats::default(),
            progress: None,
        }
    }

    /// Shows a byte progress bar per in-flight download on stderr.
    #[must_use]
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress =
            enabled.then(|| MultiProgress::with_draw_target(ProgressDrawTarget::stderr()));
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Counters over everything dispatched so far.
    #[must_use]
    pub fn stats(&self) -> DownloadStats {
        self.stats
    }

    /// Record for `url`, if it was seen in this run.
    #[must_use]
    pub fn record(&self, url: &str) -> Option<&DownloadRecord> {
        self.records.get(url)
    }

    /// Downloads every remote image among `srcs` and maps each available one
    /// to its local file.
    ///
    /// Non-remote sources are ignored. URLs attempted earlier in the run are
    /// answered from their record without a new request. Failed URLs are
    /// logged and left out of the returned map.
    #[instrument(skip(self, srcs), fields(images_dir = %self.images_dir.display()))]
    pub async fn download_all<'a, I>(&mut self, srcs: I) -> HashMap<String, PathBuf>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let remote: Vec<&str> = srcs
            .into_iter()
            .filter(|src| SourceKind::of(src) == SourceKind::Remote)
            .collect();

        let pending = self.plan(&remote);
        if !pending.is_empty() {
            self.dispatch(pending).await;
        }

        remote
            .into_iter()
            .filter_map(|url| {
                self.records
                    .get(url)
                    .filter(|record| record.is_available())
                    .map(|record| (url.to_string(), record.path.clone()))
            })
            .collect()
    }

    /// Distinct URLs from `remote` that have no record yet, with their staging paths.
    fn plan(&mut self, remote: &[&str]) -> Vec<(String, PathBuf)> {
        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for &url in remote {
            if self.records.contains_key(url) || !seen.insert(url) {
                continue;
            }
            match staging_path(&self.images_dir, url) {
                Ok(path) => pending.push((url.to_string(), path)),
                Err(e) => {
                    warn!(url = %url, error = %e, "cannot parse image URL");
                    self.finish(url.to_string(), PathBuf::new(), Err(e));
                }
            }
        }

        debug!(
            discovered = remote.len(),
            pending = pending.len(),
            "planned image downloads"
        );
        pending
    }

    async fn dispatch(&mut self, pending: Vec<(String, PathBuf)>) {
        let mut handles = Vec::with_capacity(pending.len());

        for (url, path) in pending {
            // Blocks while `concurrency` fetches are in flight. The semaphore
            // is owned here and never closed.
            let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
                self.record_failure(url, path, "semaphore closed".to_string());
                continue;
            };

            let client = self.client.clone();
            let timeout = self.timeout;
            let bar = self.progress_bar(&url);
            let task_url = url.clone();
            let task_path = path.clone();

            debug!(url = %url, path = %path.display(), "fetch");
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = client
                    .fetch_with_progress(&task_url, &task_path, timeout, bar.clone())
                    .await;
                if let Some(bar) = bar {
                    bar.finish_and_clear();
                }
                result
            });
            handles.push((url, path, handle));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        for (url, path, handle) in handles {
            match handle.await {
                Ok(result) => self.finish(url, path, result),
                Err(e) => {
                    warn!(url = %url, error = %e, "download task panicked");
                    self.record_failure(url, path, e.to_string());
                }
            }
        }

        info!(
            downloaded = self.stats.downloaded,
            skipped = self.stats.skipped,
            failed = self.stats.failed,
            "image downloads settled"
        );
    }

    fn finish(&mut self, url: String, path: PathBuf, result: Result<FetchOutcome, DownloadError>) {
        let status = match result {
            Ok(FetchOutcome::Downloaded { bytes }) => {
                debug!(url = %url, bytes, "image downloaded");
                self.stats.downloaded += 1;
                DownloadStatus::Downloaded
            }
            Ok(FetchOutcome::Skipped { bytes }) => {
                debug!(url = %url, bytes, "image already downloaded");
                self.stats.skipped += 1;
                DownloadStatus::Skipped
            }
            Err(e) => {
                warn!(url = %url, error = %e, "download failed");
                self.stats.failed += 1;
                DownloadStatus::Failed(e.to_string())
            }
        };
        self.records
            .insert(url.clone(), DownloadRecord { url, path, status });
    }

    fn record_failure(&mut self, url: String, path: PathBuf, reason: String) {
        self.stats.failed += 1;
        self.records.insert(
            url.clone(),
            DownloadRecord {
                url,
                path,
                status: DownloadStatus::Failed(reason),
            },
        );
    }

    fn progress_bar(&self, url: &str) -> Option<ProgressBar> {
        let multi = self.progress.as_ref()?;
        let bar = multi.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::with_template("{msg:20!} |{bar:10}| {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>."),
        );
        let name = url.rsplit('/').next().unwrap_or(url);
        bar.set_message(name.to_string());
        Some(bar)
    }
}
