//! Expansion of the input document list.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Pattern that stands for every `.html` file in the working directory.
pub const HTML_GLOB: &str = "*.html";

/// Returns the documents to convert.
///
/// An empty list, or the single entry `*.html` (an unexpanded shell glob),
/// becomes every `.html` file directly in `dir`, sorted by name. Any other
/// list is returned as given.
#[must_use]
pub fn expand_inputs(inputs: &[PathBuf], dir: &Path) -> Vec<PathBuf> {
    let wants_glob = match inputs {
        [] => true,
        [only] => only.as_os_str() == HTML_GLOB,
        _ => false,
    };
    if !wants_glob {
        return inputs.to_vec();
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list directory");
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .map(|path| match path.strip_prefix(".") {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => path,
        })
        .collect();
    found.sort();

    debug!(dir = %dir.display(), count = found.len(), "expanded {HTML_GLOB}");
    found
}
