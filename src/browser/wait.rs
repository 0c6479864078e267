use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{BrowserError, PageDriver, Selector};
use crate::poll::{self, PollConfig, PollError};

/// Element readiness checked by [`wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Present,
    Visible,
    Clickable,
}

impl Condition {
    fn describe(self) -> &'static str {
        match self {
            Condition::Present => "present",
            Condition::Visible => "visible",
            Condition::Clickable => "clickable",
        }
    }
}

async fn satisfies<P>(page: &P, element: &P::Element, condition: Condition) -> bool
where
    P: PageDriver + ?Sized,
{
    match condition {
        Condition::Present => true,
        Condition::Visible => page.is_visible(element).await.unwrap_or(false),
        Condition::Clickable => {
            page.is_visible(element).await.unwrap_or(false)
                && page.is_enabled(element).await.unwrap_or(false)
        }
    }
}

fn map_poll_error(e: PollError, what: String, timeout: Duration) -> BrowserError {
    match e {
        PollError::Cancelled => BrowserError::Interrupted,
        PollError::TimedOut { .. } => BrowserError::Timeout {
            what,
            after: timeout,
        },
    }
}

/// Wait until some element matching `selector` meets `condition` and return it.
pub async fn wait_for<P>(
    page: &P,
    selector: &Selector,
    condition: Condition,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<P::Element, BrowserError>
where
    P: PageDriver + ?Sized,
{
    let found = poll::poll_until(config, cancel, move || async move {
        for element in page.find_all(selector).await {
            if satisfies(page, &element, condition).await {
                return Some(element);
            }
        }
        None
    })
    .await;

    found.map_err(|e| {
        map_poll_error(
            e,
            format!("{} {}", selector.as_str(), condition.describe()),
            config.timeout,
        )
    })
}

/// Wait until no element matching `selector` is visible. A selector that
/// matches nothing counts as hidden.
pub async fn wait_until_hidden<P>(
    page: &P,
    selector: &Selector,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<(), BrowserError>
where
    P: PageDriver + ?Sized,
{
    let hidden = poll::poll_until(config, cancel, move || async move {
        for element in page.find_all(selector).await {
            if page.is_visible(&element).await.unwrap_or(false) {
                return None;
            }
        }
        Some(())
    })
    .await;

    hidden.map_err(|e| map_poll_error(e, format!("{} hidden", selector.as_str()), config.timeout))
}

/// Try each selector once, returning the first element meeting `condition`.
pub async fn first_matching<P>(
    page: &P,
    cascade: &[Selector],
    condition: Condition,
) -> Option<(Selector, P::Element)>
where
    P: PageDriver + ?Sized,
{
    for selector in cascade {
        for element in page.find_all(selector).await {
            if satisfies(page, &element, condition).await {
                return Some((selector.clone(), element));
            }
        }
    }
    None
}
