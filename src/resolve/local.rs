//! Lookup of local image references.
//!
//! Browsers and note exporters save pages with images in a sibling folder
//! (`page_files/` for "Save as", `page.resources/` for Evernote) while the
//! `src` attributes often keep a bare filename. Lookup tries an ordered list
//! of strategies and takes the first existing file.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::error::ResolveError;

/// How many times a trailing `.` may be stripped from a reference.
const MAX_DOT_RETRIES: usize = 1;

/// One way of turning a reference into a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStrategy {
    /// The reference as written, relative to the working directory.
    Literal,
    /// The reference relative to the document's directory.
    DocumentRelative,
    /// The percent-decoded reference, relative to the working directory.
    DecodedLiteral,
    /// The percent-decoded reference, relative to the document's directory.
    DecodedDocumentRelative,
    /// `<document stem>_files/<file name>` next to the document.
    ExportFilesDir,
    /// `<document stem>.resources/<file name>` next to the document.
    ExportResourcesDir,
}

/// Strategies in the order they are tried.
pub const STRATEGIES: [LocalStrategy; 6] = [
    LocalStrategy::Literal,
    LocalStrategy::DocumentRelative,
    LocalStrategy::DecodedLiteral,
    LocalStrategy::DecodedDocumentRelative,
    LocalStrategy::ExportFilesDir,
    LocalStrategy::ExportResourcesDir,
];

impl LocalStrategy {
    /// Candidate path for `reference` found in `document`, if the strategy applies.
    #[must_use]
    pub fn candidate(self, document: &Path, reference: &str) -> Option<PathBuf> {
        match self {
            Self::Literal => Some(PathBuf::from(reference)),
            Self::DocumentRelative => document_relative(document, reference),
            Self::DecodedLiteral => decoded(reference).map(PathBuf::from),
            Self::DecodedDocumentRelative => {
                decoded(reference).and_then(|r| document_relative(document, &r))
            }
            Self::ExportFilesDir => export_sibling(document, "_files", reference),
            Self::ExportResourcesDir => export_sibling(document, ".resources", reference),
        }
    }
}

/// Finds the file a local `src` refers to.
///
/// # Errors
///
/// Returns [`ResolveError::NotFound`] with every candidate checked when no
/// strategy yields an existing file.
pub fn resolve_local(document: &Path, src: &str) -> Result<PathBuf, ResolveError> {
    let mut tried: Vec<PathBuf> = Vec::new();
    let mut reference = src;

    for _ in 0..=MAX_DOT_RETRIES {
        for strategy in STRATEGIES {
            let Some(candidate) = strategy.candidate(document, reference) else {
                continue;
            };
            if tried.contains(&candidate) {
                continue;
            }
            trace!(?strategy, candidate = %candidate.display(), "checking local image");
            if candidate.is_file() {
                return Ok(candidate);
            }
            tried.push(candidate);
        }

        // Some exporters leave a stray dot after the extension.
        let Some(stripped) = reference.strip_suffix('.') else {
            break;
        };
        reference = stripped;
    }

    Err(ResolveError::not_found(src, tried))
}

fn document_relative(document: &Path, reference: &str) -> Option<PathBuf> {
    let dir = document.parent().filter(|p| !p.as_os_str().is_empty())?;
    let reference = Path::new(reference);
    if reference.is_absolute() {
        return None;
    }
    Some(dir.join(reference))
}

fn decoded(reference: &str) -> Option<String> {
    match urlencoding::decode(reference) {
        Ok(Cow::Owned(decoded)) => Some(decoded),
        _ => None,
    }
}

fn export_sibling(document: &Path, suffix: &str, reference: &str) -> Option<PathBuf> {
    let stem = document.file_stem()?.to_str()?;
    let name = Path::new(reference).file_name()?;
    let folder = format!("{stem}{suffix}");
    let base = document.parent().unwrap_or_else(|| Path::new(""));
    Some(base.join(folder).join(name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_candidate_export_dirs_use_document_stem() {
        let doc = Path::new("notes/note.html");
        assert_eq!(
            LocalStrategy::ExportFilesDir.candidate(doc, "whatever/pic.png"),
            Some(PathBuf::from("notes/note_files/pic.png"))
        );
        assert_eq!(
            LocalStrategy::ExportResourcesDir.candidate(doc, "pic.png"),
            Some(PathBuf::from("notes/note.resources/pic.png"))
        );
    }

    #[test]
    fn test_candidate_document_relative_skipped_for_bare_document() {
        assert_eq!(
            LocalStrategy::DocumentRelative.candidate(Path::new("note.html"), "pic.png"),
            None
        );
    }

    #[test]
    fn test_candidate_decoded_only_when_reference_is_encoded() {
        let doc = Path::new("note.html");
        assert_eq!(LocalStrategy::DecodedLiteral.candidate(doc, "pic.png"), None);
        assert_eq!(
            LocalStrategy::DecodedLiteral.candidate(doc, "my%20pic.png"),
            Some(PathBuf::from("my pic.png"))
        );
    }

    #[test]
    fn test_resolve_files_dir_fallback() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("note.html");
        let image = temp.path().join("note_files").join("pic.png");
        touch(&image);

        assert_eq!(resolve_local(&doc, "pic.png").unwrap(), image);
    }

    #[test]
    fn test_resolve_resources_dir_fallback() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("note.html");
        let image = temp.path().join("note.resources").join("pic.png");
        touch(&image);

        assert_eq!(resolve_local(&doc, "elsewhere/pic.png").unwrap(), image);
    }

    #[test]
    fn test_resolve_prefers_document_relative_over_export_dirs() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("note.html");
        let direct = temp.path().join("pic.png");
        touch(&direct);
        touch(&temp.path().join("note_files").join("pic.png"));

        assert_eq!(resolve_local(&doc, "pic.png").unwrap(), direct);
    }

    #[test]
    fn test_resolve_percent_encoded_reference() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("page.html");
        let image = temp.path().join("my pic.png");
        touch(&image);

        assert_eq!(resolve_local(&doc, "my%20pic.png").unwrap(), image);
    }

    #[test]
    fn test_resolve_strips_one_trailing_dot() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("note.html");
        let image = temp.path().join("note.resources").join("pic.png");
        touch(&image);

        assert_eq!(resolve_local(&doc, "pic.png.").unwrap(), image);
    }

    #[test]
    fn test_resolve_strips_at_most_one_dot() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("note.html");
        touch(&temp.path().join("pic.png"));

        let result = resolve_local(&doc, "pic.png..");
        assert!(matches!(result, Err(ResolveError::NotFound { .. })));
    }

    #[test]
    fn test_resolve_not_found_lists_candidates() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("note.html");

        match resolve_local(&doc, "missing.png") {
            Err(ResolveError::NotFound { src, tried }) => {
                assert_eq!(src, "missing.png");
                assert!(tried.contains(&temp.path().join("note_files").join("missing.png")));
                assert!(tried.contains(&temp.path().join("note.resources").join("missing.png")));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
