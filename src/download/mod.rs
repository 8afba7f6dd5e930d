//! Remote image downloads for the conversion run.
//!
//! This module fetches the remote images referenced by the input documents
//! into a staging directory before they are embedded in the book.
//!
//! # Features
//!
//! - Streaming downloads with a hard per-image timeout (2 minutes)
//! - HEAD size check that skips images already staged by an earlier run
//! - Run-wide URL deduplication (one fetch per distinct `src`)
//! - Bounded concurrency (3 in flight by default)
//! - Failures are logged and isolated; they never abort the run
//!
//! # Example
//!
//! ```no_run
//! use html_to_epub::download::HttpClient;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let outcome = client
//!     .fetch_to_path(
//!         "https://example.com/figure.png",
//!         Path::new("images/figure.png"),
//!         Duration::from_secs(120),
//!     )
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod coordinator;
mod error;
mod filename;

pub use client::{FetchOutcome, HttpClient};
pub use constants::{DEFAULT_IMAGES_DIR, DOWNLOAD_CONCURRENCY, FETCH_TIMEOUT};
pub use coordinator::{
    CoordinatorError, DownloadRecord, DownloadStats, DownloadStatus, ImageDownloader,
};
pub use error::DownloadError;
pub use filename::staging_path;
