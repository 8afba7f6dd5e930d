//! CLI entry point for html-to-epub.

use anyhow::Result;
use clap::Parser;
use html_to_epub::{PROJECT_URL, run};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    if args.about {
        println!("Visit {PROJECT_URL}");
        return Ok(());
    }

    // Priority: RUST_LOG env var > verbose flag > default (info)
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let summary = run(args.into_options()).await?;

    info!(
        output = %summary.output.display(),
        sections = summary.sections,
        images = summary.images,
        unresolved = summary.unresolved_images,
        "EPUB written"
    );

    Ok(())
}
