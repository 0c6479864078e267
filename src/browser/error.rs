use std::time::Duration;

use thiserror::Error;

/// Failures of the remote browser session.
///
/// `ElementNotFound` and `InteractionBlocked` are expected during normal
/// operation: the former drives selector fallbacks, the latter triggers a
/// script-mediated retry of the click.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no element matches {0}")]
    ElementNotFound(String),

    #[error("click on {0} was intercepted by another element")]
    InteractionBlocked(String),

    #[error("timed out after {}s waiting for {what}", after.as_secs())]
    Timeout { what: String, after: Duration },

    #[error("script failed: {0}")]
    Script(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("browser session is closed")]
    Closed,

    #[error("interrupted")]
    Interrupted,
}

impl BrowserError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, BrowserError::Interrupted)
    }
}
