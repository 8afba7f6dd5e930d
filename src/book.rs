//! In-memory book assembled during a run and serialized once as EPUB.
//!
//! Resources and sections are collected first; nothing touches the output
//! path until [`Book::write`], and then only after the whole archive was
//! generated in memory, so a failed run never leaves a partial file behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use epub_builder::{EpubBuilder, EpubContent, ZipLibrary};
use thiserror::Error;
use tracing::{debug, info};

use crate::embed::DetectedMime;

/// Folder inside the archive holding images.
const IMAGES_FOLDER: &str = "images";

/// Errors from building or writing the book.
#[derive(Debug, Error)]
pub enum BookError {
    /// Reading a resource or writing the output failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Two resources were registered under the same internal name.
    #[error("resource name {name} already used")]
    DuplicateResource {
        /// The clashing name.
        name: String,
    },

    /// The EPUB writer rejected the content.
    #[error("EPUB generation failed: {0}")]
    Epub(String),
}

impl BookError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn epub(error: impl std::fmt::Display) -> Self {
        Self::Epub(error.to_string())
    }
}

/// An image stored in the book.
#[derive(Debug, Clone)]
pub struct ImageResource {
    /// Internal file name, unique within the book.
    pub name: String,
    /// Reference to use in section markup.
    pub href: String,
    /// Content type.
    pub mime: String,
    /// File the bytes were read from.
    pub source: PathBuf,
    data: Vec<u8>,
}

impl ImageResource {
    /// Size of the stored image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the stored image is zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One chapter of the book.
#[derive(Debug, Clone)]
pub struct Section {
    /// Title shown in the table of contents.
    pub title: String,
    /// Inner markup of the source document's `<body>`.
    pub body: String,
}

/// Book metadata, cover, images, and sections in insertion order.
#[derive(Debug, Default)]
pub struct Book {
    title: String,
    author: Option<String>,
    description: Option<String>,
    cover: Option<ImageResource>,
    images: Vec<ImageResource>,
    names: HashSet<String>,
    sections: Vec<Section>,
}

impl Book {
    /// Creates an empty book.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Book title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sets the author.
    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = Some(author.into());
    }

    /// Author, if set.
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Description, if set.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Stores the cover image, replacing any previous one.
    pub fn set_cover(&mut self, data: Vec<u8>, mime: DetectedMime, source: &Path) -> &str {
        let name = format!("cover{}", mime.extension);
        let href = format!("{IMAGES_FOLDER}/{name}");
        let cover = self.cover.insert(ImageResource {
            name,
            href,
            mime: mime.mime.to_string(),
            source: source.to_path_buf(),
            data,
        });
        &cover.href
    }

    /// The cover, if set.
    #[must_use]
    pub fn cover(&self) -> Option<&ImageResource> {
        self.cover.as_ref()
    }

    /// Reads `path` and stores it as image `name`, returning the reference
    /// to put in section markup.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::DuplicateResource`] if `name` is taken and
    /// [`BookError::Io`] if the file cannot be read.
    pub fn add_image(&mut self, path: &Path, name: &str, mime: &str) -> Result<String, BookError> {
        if self.names.contains(name) {
            return Err(BookError::DuplicateResource {
                name: name.to_string(),
            });
        }
        let data = std::fs::read(path).map_err(|e| BookError::io(path, e))?;
        let href = format!("{IMAGES_FOLDER}/{name}");
        debug!(name, bytes = data.len(), source = %path.display(), "image added");

        self.names.insert(name.to_string());
        self.images.push(ImageResource {
            name: name.to_string(),
            href: href.clone(),
            mime: mime.to_string(),
            source: path.to_path_buf(),
            data,
        });
        Ok(href)
    }

    /// Images in registration order.
    #[must_use]
    pub fn images(&self) -> &[ImageResource] {
        &self.images
    }

    /// Appends a section.
    pub fn add_section(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.sections.push(Section {
            title: title.into(),
            body: body.into(),
        });
    }

    /// Sections in insertion order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Generates the EPUB archive into memory.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::Epub`] if the writer rejects any part of the book.
    pub fn to_epub_bytes(&self) -> Result<Vec<u8>, BookError> {
        let mut builder =
            EpubBuilder::new(ZipLibrary::new().map_err(BookError::epub)?).map_err(BookError::epub)?;

        builder.set_title(self.title.as_str());
        if let Some(author) = &self.author {
            builder.add_author(author.as_str());
        }
        if let Some(description) = &self.description {
            builder.set_description(vec![description.clone()]);
        }

        if let Some(cover) = &self.cover {
            builder
                .add_cover_image(cover.href.as_str(), cover.data.as_slice(), cover.mime.as_str())
                .map_err(BookError::epub)?;
        }
        for image in &self.images {
            builder
                .add_resource(image.href.as_str(), image.data.as_slice(), image.mime.as_str())
                .map_err(BookError::epub)?;
        }
        for (i, section) in self.sections.iter().enumerate() {
            let file_name = format!("section_{:04}.xhtml", i + 1);
            let xhtml = wrap_xhtml(&section.title, &section.body);
            builder
                .add_content(
                    EpubContent::new(file_name, xhtml.as_bytes()).title(section.title.as_str()),
                )
                .map_err(BookError::epub)?;
        }

        let mut buffer = Vec::new();
        builder.generate(&mut buffer).map_err(BookError::epub)?;
        Ok(buffer)
    }

    /// Serializes the book to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BookError::Epub`] if generation fails and [`BookError::Io`]
    /// if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), BookError> {
        let bytes = self.to_epub_bytes()?;
        std::fs::write(path, &bytes).map_err(|e| BookError::io(path, e))?;
        info!(
            path = %path.display(),
            bytes = bytes.len(),
            sections = self.sections.len(),
            images = self.images.len(),
            "book written"
        );
        Ok(())
    }
}

fn wrap_xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
<meta http-equiv="Content-Type" content="text/html; charset=utf-8" />
<title>{}</title>
</head>
<body>
{body}
</body>
</html>"#,
        escape_text(title)
    )
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
