use std::path::{Path, PathBuf};

use super::paths::{is_archive_name, NormalizedName};

/// The first archive or extracted directory in `download_dir` whose name
/// matches `title` once both are normalized. Archives compare by stem.
///
/// A missing or unreadable directory, and entries that cannot be inspected,
/// count as "nothing retrieved".
pub fn find_retrieved(download_dir: &Path, title: &str) -> Option<PathBuf> {
    let wanted = NormalizedName::of_title(title);
    let entries = match std::fs::read_dir(download_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %download_dir.display(), error = %e, "download directory not readable");
            return None;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let candidate = if file_type.is_dir() {
            path.file_name()
        } else if file_type.is_file() && is_archive_name(&path) {
            path.file_stem()
        } else {
            None
        };
        let Some(name) = candidate.and_then(|n| n.to_str()) else {
            continue;
        };
        if NormalizedName::new(name) == wanted {
            return Some(path);
        }
    }
    None
}

/// Whether an album titled `title` already has an archive or extracted
/// directory in `download_dir`.
pub fn is_already_retrieved(download_dir: &Path, title: &str) -> bool {
    find_retrieved(download_dir, title).is_some()
}
