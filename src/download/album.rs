//! Per-album download workflow.
//!
//! ```text
//! Discovered -> NavigatedToAlbum -> DialogOpened -> OptionConfigured
//!            -> Confirmed -> AwaitingCompletion -> Completed | TimedOut
//!            -> ReturnedToListing
//! ```
//!
//! Any failed transition ends the album as `Failed`; the return to the
//! listing is attempted whatever happened before it.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use super::completion::{self, CompletionCriteria};
use super::dedup;
use super::error::{AlbumError, FailureCause, Phase};
use super::{DownloadConfig, DownloadOutcome, DownloadStatus};
use crate::browser::wait::{first_matching, wait_for, wait_until_hidden};
use crate::browser::{click_with_fallback, first_text, BrowserError, Condition, PageDriver};
use crate::listing::AlbumDescriptor;
use crate::poll::{pause, PollError};
use crate::site::{SiteProfile, SWITCH_ON_CLASS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlbumState {
    NavigatedToAlbum,
    DialogOpened,
    OptionConfigured,
    Confirmed,
    AwaitingCompletion,
    Completed,
    TimedOut,
    ReturnedToListing,
}

/// Borrowed collaborators for processing albums against one listing.
pub struct AlbumRunner<'a, P: PageDriver + ?Sized> {
    pub page: &'a P,
    pub site: &'a SiteProfile,
    pub config: &'a DownloadConfig,
    pub listing_url: &'a str,
    pub cancel: &'a CancellationToken,
}

/// Result of the in-page steps, before returning to the listing.
enum Progress {
    Downloaded(PathBuf),
    AlreadyExists(Option<PathBuf>),
}

impl<'a, P: PageDriver + ?Sized> AlbumRunner<'a, P> {
    fn enter(&self, title: &str, state: AlbumState) {
        tracing::debug!(album = %title, state = ?state, "album state");
    }

    /// Run the whole workflow for `album`. Never fails: every error is
    /// folded into the returned outcome.
    pub async fn process(&self, album: &AlbumDescriptor) -> DownloadOutcome {
        if let Some(existing) = dedup::find_retrieved(&self.config.directory, &album.title) {
            tracing::info!(album = %album.title, "Already downloaded, skipping");
            return DownloadOutcome {
                title: album.title.clone(),
                status: DownloadStatus::AlreadyExists,
                archive_path: Some(existing),
            };
        }

        let mut title = album.title.clone();
        let result = self.download(album, &mut title).await;

        if !self.cancel.is_cancelled() {
            self.return_to_listing(&title).await;
        }

        match result {
            Ok(Progress::Downloaded(path)) => DownloadOutcome {
                title,
                status: DownloadStatus::Completed,
                archive_path: Some(path),
            },
            Ok(Progress::AlreadyExists(path)) => DownloadOutcome {
                title,
                status: DownloadStatus::AlreadyExists,
                archive_path: path,
            },
            Err(e) => DownloadOutcome {
                title,
                status: DownloadStatus::Failed(e),
                archive_path: None,
            },
        }
    }

    async fn download(
        &self,
        album: &AlbumDescriptor,
        title: &mut String,
    ) -> Result<Progress, AlbumError> {
        self.page
            .navigate(&album.url)
            .await
            .map_err(|e| AlbumError::new(Phase::Navigation, e))?;
        self.enter(title, AlbumState::NavigatedToAlbum);

        if let Some(refined) = first_text(self.page, &self.site.album_title).await {
            if refined != *title {
                tracing::debug!(listing = %title, page = %refined, "using album page title");
                *title = refined;
                if let Some(existing) = dedup::find_retrieved(&self.config.directory, title) {
                    tracing::info!(album = %title, "Already downloaded, skipping");
                    return Ok(Progress::AlreadyExists(Some(existing)));
                }
            }
        }
        let listing_title = album.title.as_str();
        let page_title = title.clone();

        self.open_dialog()
            .await
            .map_err(|(phase, e)| AlbumError::new(phase, e))?;
        self.enter(title, AlbumState::DialogOpened);

        if self.enable_originals().await {
            tracing::debug!(album = %title, "original photos enabled");
        } else {
            tracing::warn!(album = %title, "Could not enable original photos; the archive may contain reduced images");
        }
        if !pause(self.config.settle, self.cancel).await {
            return Err(AlbumError::new(Phase::Confirm, FailureCause::Interrupted));
        }
        self.enter(title, AlbumState::OptionConfigured);

        // Anything already on disk cannot be this album's archive.
        let existing = completion::snapshot(&self.config.directory);
        self.confirm()
            .await
            .map_err(|e| AlbumError::new(Phase::Confirm, e))?;
        self.enter(title, AlbumState::Confirmed);

        match wait_until_hidden(self.page, &self.site.dialog, &self.config.dialog_poll(), self.cancel).await {
            Ok(()) => tracing::debug!(album = %title, "download dialog closed"),
            Err(BrowserError::Interrupted) => {
                return Err(AlbumError::new(Phase::Confirm, FailureCause::Interrupted))
            }
            Err(e) => tracing::warn!(album = %title, error = %e, "Download dialog did not close, still waiting for the archive"),
        }

        self.enter(title, AlbumState::AwaitingCompletion);
        tracing::info!(album = %title, "Waiting for download to complete");
        let criteria = CompletionCriteria::new(
            &[listing_title, page_title.as_str()],
            self.config.min_archive_bytes,
            existing,
        );
        let download_poll = self.config.download_poll();
        match completion::await_completion(&self.config.directory, &criteria, &download_poll, self.cancel).await {
            Ok(path) => {
                self.enter(title, AlbumState::Completed);
                Ok(Progress::Downloaded(path))
            }
            Err(PollError::TimedOut { .. }) => {
                self.enter(title, AlbumState::TimedOut);
                Err(AlbumError::new(
                    Phase::Completion,
                    FailureCause::CompletionTimedOut(download_poll.timeout),
                ))
            }
            Err(PollError::Cancelled) => Err(AlbumError::new(Phase::Completion, FailureCause::Interrupted)),
        }
    }

    /// Activate the download trigger and wait for the dialog to show.
    async fn open_dialog(&self) -> Result<(), (Phase, BrowserError)> {
        let element_poll = self.config.element_poll();
        let trigger = match wait_for(
            self.page,
            &self.site.download_trigger,
            Condition::Clickable,
            &element_poll,
            self.cancel,
        )
        .await
        {
            Ok(el) => el,
            Err(BrowserError::Timeout { .. }) => {
                match first_matching(self.page, &self.site.download_trigger_fallbacks, Condition::Clickable).await {
                    Some((selector, el)) => {
                        tracing::debug!(selector = %selector, "using fallback download trigger");
                        el
                    }
                    None => {
                        return Err((
                            Phase::Trigger,
                            BrowserError::ElementNotFound("download button".into()),
                        ))
                    }
                }
            }
            Err(e) => return Err((Phase::Trigger, e)),
        };

        if let Err(e) = self.page.scroll_into_view(&trigger).await {
            tracing::debug!(error = %e, "could not scroll download button into view");
        }
        if !pause(self.config.settle, self.cancel).await {
            return Err((Phase::Trigger, BrowserError::Interrupted));
        }
        click_with_fallback(self.page, &trigger)
            .await
            .map_err(|e| (Phase::Trigger, e))?;

        wait_for(self.page, &self.site.dialog, Condition::Visible, &element_poll, self.cancel)
            .await
            .map_err(|e| (Phase::Dialog, e))?;
        Ok(())
    }

    /// Make sure the "include originals" checkbox ends up checked.
    ///
    /// The checkbox is hidden behind switch controls; clicking a switch
    /// does not always flip it, so the checkbox is re-read after every
    /// attempt and clicked directly as a last resort.
    async fn enable_originals(&self) -> bool {
        let Some(checkbox) = self.page.find_all(&self.site.originals_checkbox).await.into_iter().next() else {
            tracing::debug!("dialog has no originals checkbox");
            return false;
        };
        if self.is_checked(&checkbox).await {
            return true;
        }

        for switch in self.page.find_all(&self.site.originals_switch).await {
            let classes = self.page.attribute(&switch, "class").await.ok().flatten().unwrap_or_default();
            if classes.split_whitespace().any(|c| c == SWITCH_ON_CLASS) {
                continue;
            }
            if let Err(e) = self.page.script_click(&switch).await {
                tracing::debug!(error = %e, "switch click failed");
                continue;
            }
            if !pause(self.config.settle, self.cancel).await {
                return false;
            }
            if self.is_checked(&checkbox).await {
                return true;
            }
            tracing::debug!("checkbox still unchecked after switch click, trying next switch");
        }

        tracing::debug!("clicking originals checkbox directly");
        if let Err(e) = self.page.script_click(&checkbox).await {
            tracing::debug!(error = %e, "checkbox click failed");
            return false;
        }
        self.is_checked(&checkbox).await
    }

    async fn is_checked(&self, checkbox: &P::Element) -> bool {
        self.page.is_checked(checkbox).await.unwrap_or(false)
    }

    async fn confirm(&self) -> Result<(), BrowserError> {
        let submit = match wait_for(
            self.page,
            &self.site.dialog_submit,
            Condition::Clickable,
            &self.config.element_poll(),
            self.cancel,
        )
        .await
        {
            Ok(el) => el,
            Err(BrowserError::Timeout { .. }) => {
                match first_matching(self.page, &self.site.dialog_submit_fallbacks, Condition::Clickable).await {
                    Some((selector, el)) => {
                        tracing::debug!(selector = %selector, "using fallback submit button");
                        el
                    }
                    None => return Err(BrowserError::ElementNotFound("dialog submit button".into())),
                }
            }
            Err(e) => return Err(e),
        };
        self.page.script_click(&submit).await
    }

    async fn return_to_listing(&self, title: &str) {
        match self.page.navigate(self.listing_url).await {
            Ok(()) => self.enter(title, AlbumState::ReturnedToListing),
            Err(e) => tracing::warn!(album = %title, error = %e, "Could not return to the album listing, continuing"),
        }
    }
}
