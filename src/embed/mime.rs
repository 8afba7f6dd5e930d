//! Content sniffing for embedded files.
//!
//! The type comes from the leading bytes, never from the file name: staged
//! downloads carry whatever extension the URL had, and a failed download may
//! hold an HTML error page.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Bytes read from the start of a file for detection.
const SNIFF_LEN: u64 = 3072;

/// Leading element names that mark a page as HTML.
const HTML_ELEMENTS: [&str; 16] = [
    "html", "head", "body", "title", "meta", "link", "script", "style", "noscript", "div",
    "span", "p", "a", "table", "form", "iframe",
];

/// A detected content type and its canonical extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedMime {
    /// Content type, e.g. `image/png`.
    pub mime: &'static str,
    /// Canonical extension with leading dot, e.g. `.png`; empty when unknown.
    pub extension: &'static str,
}

impl DetectedMime {
    const SVG: Self = Self::new("image/svg+xml", ".svg");
    const HTML: Self = Self::new("text/html", ".html");
    const TEXT: Self = Self::new("text/plain", ".txt");
    const BINARY: Self = Self::new("application/octet-stream", "");

    const fn new(mime: &'static str, extension: &'static str) -> Self {
        Self { mime, extension }
    }

    /// Whether the top-level type is `image`.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// Errors from content sniffing.
#[derive(Debug, Error)]
pub enum MimeError {
    /// The file could not be opened or read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File being sniffed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Nothing to sniff.
    #[error("{path} is empty")]
    Empty {
        /// File being sniffed.
        path: PathBuf,
    },
}

/// Detects the content type of the file at `path`.
///
/// # Errors
///
/// Returns [`MimeError::Io`] if the file cannot be read and
/// [`MimeError::Empty`] for a zero-length file.
pub fn detect_file(path: &Path) -> Result<DetectedMime, MimeError> {
    let io_err = |source| MimeError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut head).map_err(io_err)?;
    if head.is_empty() {
        return Err(MimeError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(detect_bytes(&head))
}

/// Detects the content type of a byte prefix.
#[must_use]
pub fn detect_bytes(head: &[u8]) -> DetectedMime {
    if let Ok(format) = image::guess_format(head) {
        let extension = match format.extensions_str().first() {
            Some(&"jpg") => ".jpg",
            Some(&"png") => ".png",
            Some(&"gif") => ".gif",
            Some(&"webp") => ".webp",
            Some(&"bmp") => ".bmp",
            Some(&"ico") => ".ico",
            Some(&"tif" | &"tiff") => ".tiff",
            Some(&"avif") => ".avif",
            _ => "",
        };
        return DetectedMime::new(format.to_mime_type(), extension);
    }

    let Ok(text) = std::str::from_utf8(trim_partial_utf8(head)) else {
        return DetectedMime::BINARY;
    };
    classify_markup(&text.to_ascii_lowercase())
}

/// Classifies text by its doctype or first element.
///
/// HTML is checked first, so a page with inline `<svg>` stays HTML.
fn classify_markup(lower: &str) -> DetectedMime {
    let rest = skip_prolog(lower);

    if let Some(doctype) = rest.strip_prefix("<!doctype") {
        return if doctype.trim_start().starts_with("svg") {
            DetectedMime::SVG
        } else {
            DetectedMime::HTML
        };
    }

    match first_element(rest) {
        Some(name) if HTML_ELEMENTS.contains(&name) => DetectedMime::HTML,
        Some(name) if name == "svg" || name.ends_with(":svg") => DetectedMime::SVG,
        _ if rest.contains("<html") => DetectedMime::HTML,
        _ => DetectedMime::TEXT,
    }
}

/// Skips whitespace, a byte order mark, XML declarations and comments.
///
/// An unterminated declaration or comment leaves nothing to classify.
fn skip_prolog(mut text: &str) -> &str {
    loop {
        text = text.trim_start_matches('\u{feff}').trim_start();
        let end = if text.starts_with("<?") {
            text[2..].find("?>").map(|i| i + 4)
        } else if text.starts_with("<!--") {
            text[4..].find("-->").map(|i| i + 7)
        } else {
            return text;
        };
        match end {
            Some(end) => text = &text[end..],
            None => return "",
        }
    }
}

/// Name of the element `text` opens with, if any.
fn first_element(text: &str) -> Option<&str> {
    let tag = text.strip_prefix('<')?;
    let end = tag
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
        .unwrap_or(tag.len());
    let name = &tag[..end];
    name.starts_with(|c: char| c.is_ascii_alphabetic()).then_some(name)
}

/// Drops a multi-byte character cut off by the sniff window.
fn trim_partial_utf8(head: &[u8]) -> &[u8] {
    match std::str::from_utf8(head) {
        Ok(_) => head,
        Err(e) if e.error_len().is_none() => &head[..e.valid_up_to()],
        Err(_) => head,
    }
}
