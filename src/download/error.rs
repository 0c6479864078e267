use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::browser::BrowserError;

/// Step of the per-album workflow that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Navigation,
    Trigger,
    Dialog,
    Confirm,
    Completion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Navigation => "opening album",
            Phase::Trigger => "opening download dialog",
            Phase::Dialog => "waiting for download dialog",
            Phase::Confirm => "confirming download",
            Phase::Completion => "waiting for archive",
        })
    }
}

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("no archive appeared within {}s", .0.as_secs())]
    CompletionTimedOut(Duration),

    #[error("interrupted")]
    Interrupted,
}

/// Why one album could not be downloaded, with the phase it failed in.
#[derive(Debug, Error)]
#[error("{phase} failed: {source}")]
pub struct AlbumError {
    pub phase: Phase,
    pub source: FailureCause,
}

impl AlbumError {
    pub fn new(phase: Phase, source: impl Into<FailureCause>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        match &self.source {
            FailureCause::Interrupted => true,
            FailureCause::Browser(e) => e.is_interrupted(),
            FailureCause::CompletionTimedOut(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.source,
            FailureCause::CompletionTimedOut(_) | FailureCause::Browser(BrowserError::Timeout { .. })
        )
    }
}
