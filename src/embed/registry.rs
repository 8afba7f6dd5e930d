//! Run-wide registry of embedded images.
//!
//! The registry owns the map from source key (the literal `src` string) to
//! the internal reference, plus the counter that names new resources. Both
//! live behind `&mut self`, so a lookup and the insert that follows it cannot
//! interleave with another embed.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use super::mime::{MimeError, detect_file};
use crate::book::{Book, BookError};

/// Why an image could not be embedded.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The content type could not be detected.
    #[error("cannot detect image mime of {src}: {source}")]
    Mime {
        /// Source key.
        src: String,
        /// Detection failure.
        #[source]
        source: MimeError,
    },

    /// The file is not an image.
    #[error("mime of {src} is {mime} instead of image")]
    NotImage {
        /// Source key.
        src: String,
        /// Detected content type.
        mime: String,
    },

    /// The book refused the resource.
    #[error("cannot add image {src}: {source}")]
    Book {
        /// Source key.
        src: String,
        /// Book failure.
        #[source]
        source: BookError,
    },
}

/// Source key to internal reference map with sequential resource naming.
#[derive(Debug, Default)]
pub struct EmbeddingRegistry {
    refs: HashMap<String, String>,
    next_index: usize,
}

impl EmbeddingRegistry {
    /// Creates an empty registry; the first image is named `image_000`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference already assigned to `src`, if any.
    #[must_use]
    pub fn lookup(&self, src: &str) -> Option<&str> {
        self.refs.get(src).map(String::as_str)
    }

    /// Number of distinct sources embedded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether nothing has been embedded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Embeds the file at `local` under source key `src`, at most once per key.
    ///
    /// A key seen before returns its existing reference without touching the
    /// file or the book.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] if the type cannot be detected, is not an
    /// image, or the book rejects the resource. Nothing is recorded then, so
    /// the key stays unembedded.
    pub fn embed(&mut self, book: &mut Book, src: &str, local: &Path) -> Result<String, EmbedError> {
        if let Some(existing) = self.refs.get(src) {
            return Ok(existing.clone());
        }

        let detected = detect_file(local).map_err(|source| EmbedError::Mime {
            src: src.to_string(),
            source,
        })?;
        if !detected.is_image() {
            return Err(EmbedError::NotImage {
                src: src.to_string(),
                mime: detected.mime.to_string(),
            });
        }

        let mut name = format!("image_{:03}", self.next_index);
        if !name.ends_with(detected.extension) {
            name.push_str(detected.extension);
        }

        let href = book
            .add_image(local, &name, detected.mime)
            .map_err(|source| EmbedError::Book {
                src: src.to_string(),
                source,
            })?;
        self.next_index += 1;
        self.refs.insert(src.to_string(), href.clone());

        debug!(src = %src, local = %local.display(), href = %href, "image embedded");
        Ok(href)
    }
}
