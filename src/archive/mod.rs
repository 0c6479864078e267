//! Post-processing of completed downloads: each archive in the download
//! directory is extracted into a sibling directory named after it.
//!
//! Safe to re-run. An archive whose directory already exists with content
//! is treated as extracted; extraction happens in a staging directory that
//! only takes the target's name once complete.

pub mod error;
pub mod zip;

use std::path::{Path, PathBuf};

pub use self::error::ArchiveError;
pub use self::zip::ZipExtractor;
use crate::download::paths::is_archive_name;

const PARTIAL_SUFFIX: &str = ".partial";

/// Unpacks one archive into an existing directory, returning the number of
/// files written.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<usize, ArchiveError>;
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub extracted: Vec<PathBuf>,
    pub already_extracted: Vec<PathBuf>,
    pub deleted: usize,
    pub failed: Vec<(PathBuf, ArchiveError)>,
}

impl ExtractionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Archive files directly inside `dir`, sorted by name.
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ArchiveError::io(dir, e)),
    };
    let mut archives: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .filter(|p| is_archive_name(p))
        .collect();
    archives.sort();
    Ok(archives)
}

fn has_content(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

fn delete_archive(archive: &Path, report: &mut ExtractionReport) {
    match std::fs::remove_file(archive) {
        Ok(()) => {
            tracing::debug!(archive = %archive.display(), "deleted archive");
            report.deleted += 1;
        }
        Err(e) => tracing::warn!("Could not delete {}: {}", archive.display(), e),
    }
}

/// Extract into `<target>.partial` and move it into place only once every
/// entry is written. A failed extraction leaves `target` as it was, so a
/// later run never sees a half-extracted directory as finished.
fn extract_staged(
    extractor: &dyn ArchiveExtractor,
    archive: &Path,
    target: &Path,
) -> Result<usize, ArchiveError> {
    let mut staging = target.as_os_str().to_owned();
    staging.push(PARTIAL_SUFFIX);
    let staging = PathBuf::from(staging);

    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| ArchiveError::io(&staging, e))?;
    }
    std::fs::create_dir_all(&staging).map_err(|e| ArchiveError::io(&staging, e))?;

    let files = match extractor.extract(archive, &staging) {
        Ok(files) => files,
        Err(e) => {
            if let Err(rm) = std::fs::remove_dir_all(&staging) {
                tracing::warn!("Could not remove {}: {}", staging.display(), rm);
            }
            return Err(e);
        }
    };

    // An empty directory may already sit at the target; it has no content to keep.
    if target.is_dir() {
        std::fs::remove_dir(target).map_err(|e| ArchiveError::io(target, e))?;
    }
    std::fs::rename(&staging, target).map_err(|e| ArchiveError::io(target, e))?;
    Ok(files)
}

/// Extract every archive in `dir`, optionally deleting each source archive
/// once its content is on disk. Failures are collected per archive.
pub fn post_process(
    dir: &Path,
    extractor: &dyn ArchiveExtractor,
    delete_after: bool,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    let archives = match list_archives(dir) {
        Ok(archives) => archives,
        Err(e) => {
            tracing::warn!("Cannot list archives: {}", e);
            return report;
        }
    };
    if archives.is_empty() {
        tracing::info!("No archives to extract");
        return report;
    }
    tracing::info!("Extracting {} archives", archives.len());

    for archive in archives {
        let Some(stem) = archive.file_stem() else {
            continue;
        };
        let target = dir.join(stem);

        if target.is_dir() && has_content(&target) {
            tracing::info!("Already extracted: {}", target.display());
            report.already_extracted.push(target);
            if delete_after {
                delete_archive(&archive, &mut report);
            }
            continue;
        }

        match extract_staged(extractor, &archive, &target) {
            Ok(files) => {
                tracing::info!("Extracted {} ({} files)", target.display(), files);
                report.extracted.push(target);
                if delete_after {
                    delete_archive(&archive, &mut report);
                }
            }
            Err(e) => {
                tracing::error!("Failed to extract {}: {}", archive.display(), e);
                report.failed.push((archive, e));
            }
        }
    }

    report
}

/// [`post_process`] with the zip extractor on a blocking thread.
pub async fn post_process_blocking(dir: PathBuf, delete_after: bool) -> anyhow::Result<ExtractionReport> {
    let report = tokio::task::spawn_blocking(move || post_process(&dir, &ZipExtractor, delete_after)).await?;
    Ok(report)
}

pub fn log_report(report: &ExtractionReport) {
    tracing::info!("── Extraction Summary ──");
    tracing::info!(
        "  {} extracted, {} already extracted, {} failed",
        report.extracted.len(),
        report.already_extracted.len(),
        report.failed.len()
    );
    if report.deleted > 0 {
        tracing::info!("  {} archives deleted", report.deleted);
    }
    for (archive, e) in &report.failed {
        tracing::error!("  failed: {}: {}", archive.display(), e);
    }
}
