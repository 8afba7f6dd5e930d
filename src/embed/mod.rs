//! Embedding of resolved image files into the book.
//!
//! - [`mime`] - content sniffing from leading bytes
//! - [`EmbeddingRegistry`] - at-most-once registration per source key

pub mod mime;
mod registry;

pub use mime::{DetectedMime, MimeError, detect_bytes, detect_file};
pub use registry::{EmbedError, EmbeddingRegistry};
