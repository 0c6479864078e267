//! Download completion is only observable through the filesystem: the
//! browser writes the archive under a temporary name and renames it when
//! done. Detection polls the download directory for a finished archive.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::paths::{is_archive_name, is_partial_download, NormalizedName};
use crate::poll::{poll_until, PollConfig, PollError};

/// Names of the regular files currently in `dir`.
pub fn snapshot(dir: &Path) -> HashSet<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return HashSet::new();
    };
    entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .collect()
}

/// What a finished archive for one album looks like.
#[derive(Debug, Clone)]
pub struct CompletionCriteria {
    /// Normalized titles, any of which the file name must contain.
    pub titles: Vec<NormalizedName>,
    pub min_bytes: u64,
    /// Files present before the download was requested are never a match.
    pub existing: HashSet<PathBuf>,
}

impl CompletionCriteria {
    pub fn new(titles: &[&str], min_bytes: u64, existing: HashSet<PathBuf>) -> Self {
        let mut normalized: Vec<NormalizedName> = Vec::new();
        for title in titles {
            let n = NormalizedName::of_title(title);
            if !n.is_empty() && !normalized.contains(&n) {
                normalized.push(n);
            }
        }
        Self {
            titles: normalized,
            min_bytes,
            existing,
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.existing.contains(path) || !is_archive_name(path) {
            return false;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if is_partial_download(name) {
            return false;
        }
        let name = NormalizedName::new(name);
        if !self.titles.iter().any(|t| name.contains(t)) {
            return false;
        }
        match std::fs::metadata(path) {
            Ok(meta) => meta.is_file() && meta.len() >= self.min_bytes,
            Err(_) => false,
        }
    }
}

/// One scan of `dir` for a qualifying archive.
pub fn find_completed(dir: &Path, criteria: &CompletionCriteria) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut matches: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| criteria.accepts(p))
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Poll `dir` until a qualifying archive appears.
pub async fn await_completion(
    dir: &Path,
    criteria: &CompletionCriteria,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<PathBuf, PollError> {
    poll_until(config, cancel, || async { find_completed(dir, criteria) }).await
}
