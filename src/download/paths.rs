use std::fmt;
use std::path::Path;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Replace characters that are invalid on common filesystems
/// (`< > : " / \ | ? *`) with `_` and strip leading/trailing spaces and dots.
/// An empty result becomes `"unnamed"`.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Comparison key for album names: diacritics removed, lowercased, with
/// underscores treated as spaces and whitespace runs collapsed.
///
/// Browsers and the remote service disagree on how accented characters and
/// spaces end up in a downloaded file's name, so every dedup and completion
/// check compares these instead of raw strings. Never displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedName(String);

impl NormalizedName {
    pub fn new(raw: &str) -> Self {
        let stripped: String = raw
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>()
            .to_lowercase();
        let spaced = stripped.replace('_', " ");
        NormalizedName(spaced.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Key for a title as it would appear in a file name.
    pub fn of_title(title: &str) -> Self {
        Self::new(&sanitize_filename(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `needle` occurs in this name. An empty needle never matches.
    pub fn contains(&self, needle: &NormalizedName) -> bool {
        !needle.is_empty() && self.0.contains(needle.as_str())
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True for a `.zip` file name (case-insensitive).
pub fn is_archive_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Suffixes browsers give files that are still being written.
const PARTIAL_MARKERS: &[&str] = &[".crdownload", ".part", ".download", ".tmp"];

pub fn is_partial_download(file_name: &str) -> bool {
    let lowered = file_name.to_lowercase();
    PARTIAL_MARKERS.iter().any(|m| lowered.contains(m))
}
