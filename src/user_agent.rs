//! User-Agent string for image requests.

/// Project home, sent in the User-Agent and printed by `--about`.
pub const PROJECT_URL: &str = "https://github.com/gonejack/html-to-epub";

/// Default User-Agent for image downloads (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("html-to-epub/{version} (+{PROJECT_URL})")
}
