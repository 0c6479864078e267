//! Listing phase: make the album listing render fully, then resolve the
//! albums on it.

pub mod discovery;
pub mod readiness;

pub use discovery::{discover, AlbumDescriptor};
pub use readiness::{stabilize, ScrollPlan};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::browser::{click_with_fallback, wait, Condition, PageDriver};
use crate::poll::pause;
use crate::site::SiteProfile;

/// Accept the cookie consent banner if one is showing. Best effort: a
/// missing banner or a failed click is not an error.
pub async fn accept_cookies<P>(page: &P, site: &SiteProfile, cancel: &CancellationToken) -> bool
where
    P: PageDriver + ?Sized,
{
    let Some((_, button)) =
        wait::first_matching(page, std::slice::from_ref(&site.cookie_accept), Condition::Visible).await
    else {
        return false;
    };
    match click_with_fallback(page, &button).await {
        Ok(()) => {
            tracing::info!("Accepted cookie consent");
            pause(Duration::from_secs(1), cancel).await;
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not dismiss cookie consent");
            false
        }
    }
}
