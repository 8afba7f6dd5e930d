//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use html_to_epub::{
    ConvertOptions, DEFAULT_AUTHOR, DEFAULT_IMAGES_DIR, DEFAULT_OUTPUT, DEFAULT_TITLE,
};

/// Convert HTML files into a single EPUB.
///
/// Remote images are downloaded and local images are looked up next to each
/// document; every image ends up inside the book.
#[derive(Parser, Debug)]
#[command(name = "html-to-epub")]
#[command(author, version, about)]
pub struct Args {
    /// Output EPUB file (must not exist)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Cover image (a bundled cover is used by default)
    #[arg(long)]
    pub cover: Option<PathBuf>,

    /// Book title
    #[arg(long, default_value = DEFAULT_TITLE)]
    pub title: String,

    /// Book author
    #[arg(long, default_value = DEFAULT_AUTHOR)]
    pub author: String,

    /// Staging directory for downloaded images
    #[arg(long, default_value = DEFAULT_IMAGES_DIR, hide = true)]
    pub images_dir: PathBuf,

    /// Debug logging and download progress bars
    #[arg(short, long)]
    pub verbose: bool,

    /// Show project information and exit
    #[arg(long)]
    pub about: bool,

    /// HTML files to convert (default: every *.html in the current directory)
    #[arg(value_name = "HTML")]
    pub html: Vec<PathBuf>,
}

impl Args {
    /// Library options for these arguments.
    pub fn into_options(self) -> ConvertOptions {
        ConvertOptions {
            inputs: self.html,
            output: self.output,
            cover: self.cover,
            title: self.title,
            author: self.author,
            images_dir: self.images_dir,
            verbose: self.verbose,
        }
    }
}
