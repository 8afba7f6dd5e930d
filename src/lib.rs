//! html-to-epub library
//!
//! Converts a set of HTML documents into one EPUB. Each document becomes a
//! section; every image it references, remote or local, is embedded once.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - bounded, deduplicated fetching of remote images
//! - [`resolve`] - mapping of `<img>` sources to files on disk
//! - [`embed`] - MIME sniffing and at-most-once image registration
//! - [`document`] - HTML loading, ad cleanup, and body serialization
//! - [`book`] - in-memory book and EPUB serialization
//! - [`convert`] - the per-run pipeline tying the above together
//! - [`input`] - expansion of the input file list

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod book;
pub mod convert;
pub mod document;
pub mod download;
pub mod embed;
pub mod input;
pub mod resolve;
mod user_agent;

// Re-export commonly used types
pub use book::{Book, BookError, ImageResource, Section};
pub use convert::{
    ConvertError, ConvertOptions, Converter, DEFAULT_AUTHOR, DEFAULT_OUTPUT, DEFAULT_TITLE,
    RunSummary, run,
};
pub use document::{DocumentError, HtmlDocument};
pub use download::{
    DEFAULT_IMAGES_DIR, DownloadError, DownloadStats, FetchOutcome, HttpClient, ImageDownloader,
};
pub use embed::{DetectedMime, EmbedError, EmbeddingRegistry};
pub use input::expand_inputs;
pub use resolve::{ResolveError, SourceKind, resolve_local};
pub use user_agent::PROJECT_URL;
