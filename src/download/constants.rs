//! Constants for the download module (timeouts, concurrency).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Hard timeout for one image fetch, HEAD request and body included (2 minutes).
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum number of image downloads in flight at once.
pub const DOWNLOAD_CONCURRENCY: usize = 3;

/// Default staging directory for downloaded images.
pub const DEFAULT_IMAGES_DIR: &str = "images";
