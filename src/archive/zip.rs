use std::fs::File;
use std::path::Path;

use super::error::ArchiveError;
use super::ArchiveExtractor;

/// Extracts `.zip` archives with the `zip` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
        let file = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
        // Opening reads the central directory, which rejects truncated and
        // non-zip files before anything is written.
        let mut archive =
            ::zip::ZipArchive::new(file).map_err(|e| ArchiveError::corrupt(archive_path, e))?;

        let mut written = 0;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ArchiveError::corrupt(archive_path, e))?;

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                tracing::warn!(archive = %archive_path.display(), entry = entry.name(), "skipping entry with unsafe path");
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| ArchiveError::io(&target, e))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
            }
            let mut out = File::create(&target).map_err(|e| ArchiveError::io(&target, e))?;
            // A bad entry surfaces here as a checksum or inflate error.
            std::io::copy(&mut entry, &mut out)
                .map_err(|e| ArchiveError::corrupt(archive_path, format!("{}: {}", entry.name(), e)))?;
            written += 1;
        }

        tracing::debug!(archive = %archive_path.display(), files = written, "extracted archive");
        Ok(written)
    }
}
