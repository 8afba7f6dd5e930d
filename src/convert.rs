//! Conversion of a list of HTML documents into one EPUB.
//!
//! A [`Converter`] owns everything that lives for the run: the book being
//! assembled, the image downloader, and the embedding registry. Documents are
//! added one at a time in input order; the archive is written once at the end.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::book::{Book, BookError};
use crate::document::{DocumentError, HtmlDocument};
use crate::download::{DEFAULT_IMAGES_DIR, DownloadStats, HttpClient, ImageDownloader};
use crate::embed::{EmbeddingRegistry, detect_bytes};
use crate::input::expand_inputs;
use crate::resolve::{SourceKind, resolve};
use crate::user_agent::PROJECT_URL;

/// Default output file.
pub const DEFAULT_OUTPUT: &str = "output.epub";

/// Default book title.
pub const DEFAULT_TITLE: &str = "HTML";

/// Default book author.
pub const DEFAULT_AUTHOR: &str = "HTML to Epub";

/// Cover used when none is given.
const DEFAULT_COVER: &[u8] = include_bytes!("../assets/cover.png");

/// Attributes dropped from every `<img>`; they point at sources that are not embedded.
const STRIPPED_IMAGE_ATTRS: [&str; 2] = ["loading", "srcset"];

/// Fatal conversion errors. Any of these aborts the run without writing output.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No input documents were given or found.
    #[error("no .html file given")]
    NoInput,

    /// The output path is taken.
    #[error("output file {path} already exists")]
    OutputExists {
        /// Requested output path.
        path: PathBuf,
    },

    /// The image staging directory could not be created.
    #[error("cannot create images directory {path}: {source}")]
    ImagesDir {
        /// Staging directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built.
    #[error("cannot create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The cover image could not be read.
    #[error("cannot read cover {path}: {source}")]
    Cover {
        /// Cover path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The cover is not an image.
    #[error("cover {path} has mime {mime}, expected an image")]
    CoverMime {
        /// Cover path.
        path: PathBuf,
        /// Detected content type.
        mime: String,
    },

    /// An input document could not be read.
    #[error("cannot parse {path}: {source}")]
    Document {
        /// Document path.
        path: PathBuf,
        /// Loading failure.
        #[source]
        source: DocumentError,
    },

    /// The book could not be generated or written.
    #[error("cannot write {path}: {source}")]
    Write {
        /// Output path.
        path: PathBuf,
        /// Book failure.
        #[source]
        source: BookError,
    },
}

impl ConvertError {
    fn document(path: &Path, source: DocumentError) -> Self {
        Self::Document {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Settings for one conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// HTML documents in section order. Empty, or the single entry `*.html`,
    /// means every `.html` file in the working directory.
    pub inputs: Vec<PathBuf>,
    /// EPUB to create; must not exist.
    pub output: PathBuf,
    /// Cover image; the bundled cover when `None`.
    pub cover: Option<PathBuf>,
    /// Book title.
    pub title: String,
    /// Book author.
    pub author: String,
    /// Staging directory for downloaded images.
    pub images_dir: PathBuf,
    /// Show per-download progress bars.
    pub verbose: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            cover: None,
            title: DEFAULT_TITLE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            verbose: false,
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Written EPUB.
    pub output: PathBuf,
    /// Number of sections.
    pub sections: usize,
    /// Number of distinct embedded images, cover excluded.
    pub images: usize,
    /// `<img>` elements left pointing at their original source.
    pub unresolved_images: usize,
    /// Remote fetch counters.
    pub downloads: DownloadStats,
}

/// Converts the documents named in `options` into one EPUB.
///
/// The output path is checked before anything else, so an existing file
/// aborts the run before any document is parsed or any request is sent.
///
/// # Errors
///
/// Returns a [`ConvertError`] for any fatal condition; per-image problems
/// are logged and do not fail the run.
pub async fn run(options: ConvertOptions) -> Result<RunSummary, ConvertError> {
    if options.output.exists() {
        return Err(ConvertError::OutputExists {
            path: options.output,
        });
    }

    let inputs = expand_inputs(&options.inputs, Path::new("."));
    if inputs.is_empty() {
        return Err(ConvertError::NoInput);
    }

    let mut converter = Converter::new(options)?;
    for (i, path) in inputs.iter().enumerate() {
        converter.add_document(i + 1, path).await?;
    }
    converter.finish()
}

/// One conversion run in progress.
pub struct Converter {
    options: ConvertOptions,
    book: Book,
    downloader: ImageDownloader,
    registry: EmbeddingRegistry,
    unresolved_images: usize,
}

impl Converter {
    /// Prepares the staging directory and the book metadata and cover.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::ImagesDir`], [`ConvertError::Client`],
    /// [`ConvertError::Cover`], or [`ConvertError::CoverMime`].
    pub fn new(options: ConvertOptions) -> Result<Self, ConvertError> {
        std::fs::create_dir_all(&options.images_dir).map_err(|source| ConvertError::ImagesDir {
            path: options.images_dir.clone(),
            source,
        })?;

        let client = HttpClient::new().map_err(ConvertError::Client)?;
        let downloader =
            ImageDownloader::new(client, &options.images_dir).with_progress(options.verbose);

        let mut book = Book::new(options.title.as_str());
        book.set_author(options.author.as_str());
        book.set_description(description(SystemTime::now()));
        set_cover(&mut book, options.cover.as_deref())?;

        Ok(Self {
            options,
            book,
            downloader,
            registry: EmbeddingRegistry::new(),
            unresolved_images: 0,
        })
    }

    /// The book assembled so far.
    #[must_use]
    pub fn book(&self) -> &Book {
        &self.book
    }

    /// Appends the document at `path` as section number `index` (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Document`] if the document cannot be read.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn add_document(&mut self, index: usize, path: &Path) -> Result<(), ConvertError> {
        let document = HtmlDocument::open(path).map_err(|e| ConvertError::document(path, e))?;
        document.clean();

        let sources = document.image_sources();
        let downloads = self
            .downloader
            .download_all(sources.iter().map(String::as_str))
            .await;

        for image in document.images() {
            for attr in STRIPPED_IMAGE_ATTRS {
                image.remove_attr(attr);
            }

            let src = image.src();
            if SourceKind::of(&src) == SourceKind::Inline {
                continue;
            }
            if let Some(existing) = self.registry.lookup(&src) {
                image.set_src(existing);
                continue;
            }

            let local = match resolve(path, &src, &downloads) {
                Ok(local) => local,
                Err(e) => {
                    warn!(src = %src, error = %e, "cannot locate image");
                    self.unresolved_images += 1;
                    continue;
                }
            };
            match self.registry.embed(&mut self.book, &src, &local) {
                Ok(href) => {
                    debug!(src = %src, href = %href, "replace image source");
                    image.set_src(&href);
                }
                Err(e) => {
                    warn!(src = %src, local = %local.display(), error = %e, "cannot embed image");
                    self.unresolved_images += 1;
                }
            }
        }

        let title = section_title(index, document.title(), path);
        let body = document.body_xhtml();
        info!(title = %title, "section added");
        self.book.add_section(title, body);
        Ok(())
    }

    /// Writes the book to the configured output.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Write`] if generation or the file write fails.
    pub fn finish(self) -> Result<RunSummary, ConvertError> {
        let output = self.options.output;
        self.book
            .write(&output)
            .map_err(|source| ConvertError::Write {
                path: output.clone(),
                source,
            })?;

        let downloads = self.downloader.stats();
        info!(
            downloaded = downloads.downloaded,
            skipped = downloads.skipped,
            failed = downloads.failed,
            unresolved = self.unresolved_images,
            "conversion finished"
        );

        Ok(RunSummary {
            output,
            sections: self.book.sections().len(),
            images: self.book.images().len(),
            unresolved_images: self.unresolved_images,
            downloads,
        })
    }
}

fn set_cover(book: &mut Book, cover: Option<&Path>) -> Result<(), ConvertError> {
    let (data, source) = match cover {
        Some(path) => {
            let data = std::fs::read(path).map_err(|source| ConvertError::Cover {
                path: path.to_path_buf(),
                source,
            })?;
            (data, path.to_path_buf())
        }
        None => (DEFAULT_COVER.to_vec(), PathBuf::from("assets/cover.png")),
    };

    let detected = detect_bytes(&data);
    if !detected.is_image() {
        return Err(ConvertError::CoverMime {
            path: source,
            mime: detected.mime.to_string(),
        });
    }
    let href = book.set_cover(data, detected, &source);
    debug!(cover = %source.display(), href, "cover set");
    Ok(())
}

fn description(now: SystemTime) -> String {
    let host = PROJECT_URL.trim_start_matches("https://");
    format!(
        "Epub generated at {} with {host}",
        httpdate::fmt_http_date(now)
    )
}

/// `"<index>. <title>"`, where the title falls back to the file stem.
fn section_title(index: usize, title: Option<String>, path: &Path) -> String {
    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    format!("{index}. {title}")
}
