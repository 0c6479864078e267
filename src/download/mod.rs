//! Download orchestration: walks the discovered albums one at a time,
//! consulting the dedup index before each and recording an outcome after.

pub mod album;
pub mod completion;
pub mod dedup;
pub mod error;
pub mod paths;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::browser::PageDriver;
use crate::listing::AlbumDescriptor;
use crate::poll::{pause, PollConfig};
use crate::site::SiteProfile;

pub use album::AlbumRunner;
pub use error::{AlbumError, Phase};

/// Interval for element and dialog waits.
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Subset of application config consumed by the orchestrator.
/// Decoupled from CLI parsing so the engine can be tested independently.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub(crate) directory: PathBuf,
    pub(crate) min_archive_bytes: u64,
    pub(crate) element_timeout: Duration,
    pub(crate) dialog_timeout: Duration,
    pub(crate) download_timeout: Duration,
    pub(crate) poll_interval: Duration,
    /// Pause after UI actions that animate (scrolling, switches).
    pub(crate) settle: Duration,
    pub(crate) between_albums: Duration,
    pub(crate) no_progress_bar: bool,
}

impl DownloadConfig {
    pub(crate) fn element_poll(&self) -> PollConfig {
        PollConfig::new(ELEMENT_POLL_INTERVAL, self.element_timeout)
    }

    pub(crate) fn dialog_poll(&self) -> PollConfig {
        PollConfig::new(ELEMENT_POLL_INTERVAL, self.dialog_timeout)
    }

    pub(crate) fn download_poll(&self) -> PollConfig {
        PollConfig::new(self.poll_interval, self.download_timeout)
    }
}

#[derive(Debug)]
pub enum DownloadStatus {
    Completed,
    AlreadyExists,
    Failed(AlbumError),
}

/// What happened to one album in this run.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Listing title, or the album page's own title when it had one.
    pub title: String,
    pub status: DownloadStatus,
    pub archive_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub processed: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunStatistics {
    fn record(&mut self, status: &DownloadStatus) {
        self.processed += 1;
        match status {
            DownloadStatus::Completed => self.downloaded += 1,
            DownloadStatus::AlreadyExists => self.skipped += 1,
            DownloadStatus::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStatistics,
    pub outcomes: Vec<DownloadOutcome>,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &AlbumError)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            DownloadStatus::Failed(e) => Some((o.title.as_str(), e)),
            _ => None,
        })
    }
}

/// Create a progress bar with a consistent template.
///
/// Returns `ProgressBar::hidden()` when the user passed `--no-progress-bar` or
/// stdout is not a TTY.
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {wide_msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}

/// Process `albums` in order, returning to `listing_url` after each.
///
/// Per-album failures are recorded and the loop moves on; an interrupt
/// stops it before the next album starts.
pub async fn run_albums<P>(
    page: &P,
    site: &SiteProfile,
    config: &DownloadConfig,
    albums: &[AlbumDescriptor],
    listing_url: &str,
    cancel: &CancellationToken,
) -> RunReport
where
    P: PageDriver + ?Sized,
{
    let started = Instant::now();
    let runner = AlbumRunner {
        page,
        site,
        config,
        listing_url,
        cancel,
    };
    let total = albums.len();
    let pb = create_progress_bar(config.no_progress_bar, total as u64);
    let mut stats = RunStatistics::default();
    let mut outcomes = Vec::with_capacity(total);
    let mut interrupted = false;

    for (i, album) in albums.iter().enumerate() {
        if cancel.is_cancelled() {
            pb.suspend(|| tracing::info!("Shutdown requested, not starting further albums"));
            interrupted = true;
            break;
        }
        pb.set_message(album.title.clone());
        pb.suspend(|| tracing::info!("[{}/{}] Processing: {}", i + 1, total, album.title));

        let outcome = runner.process(album).await;
        stats.record(&outcome.status);
        let attempted = match &outcome.status {
            DownloadStatus::Completed => {
                let path = outcome.archive_path.as_deref().unwrap_or(config.directory.as_path());
                pb.suspend(|| tracing::info!("Downloaded {} -> {}", outcome.title, path.display()));
                true
            }
            DownloadStatus::AlreadyExists => false,
            DownloadStatus::Failed(e) => {
                interrupted = e.is_interrupted();
                pb.suspend(|| tracing::error!(phase = ?e.phase, "Album {} failed: {}", outcome.title, e));
                true
            }
        };
        outcomes.push(outcome);
        pb.inc(1);

        if interrupted {
            break;
        }
        if attempted && i + 1 < total && !pause(config.between_albums, cancel).await {
            interrupted = true;
            break;
        }
    }
    pb.finish_and_clear();

    RunReport {
        stats,
        outcomes,
        interrupted,
        elapsed: started.elapsed(),
    }
}

pub fn log_summary(report: &RunReport, directory: &std::path::Path) {
    let s = &report.stats;
    tracing::info!("── Summary ──");
    if report.interrupted {
        tracing::info!("  Interrupted, remaining albums were not started");
    }
    tracing::info!(
        "  {} processed, {} downloaded, {} skipped, {} failed",
        s.processed,
        s.downloaded,
        s.skipped,
        s.failed
    );
    tracing::info!("  destination: {}", directory.display());
    tracing::info!("  elapsed: {}", format_duration(report.elapsed));
    for (title, e) in report.failures() {
        tracing::error!("  failed: {} ({})", title, e);
    }
}

pub(crate) fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{Effect, FakeElement, FakePage};
    use crate::listing::discover;
    use std::path::Path;

    const LISTING: &str = "https://eu.zonerama.com/POLeNo/57348?secret=ABC";

    fn test_config(dir: &Path) -> DownloadConfig {
        DownloadConfig {
            directory: dir.to_path_buf(),
            min_archive_bytes: 1024,
            element_timeout: Duration::from_millis(50),
            dialog_timeout: Duration::from_millis(50),
            download_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
            settle: Duration::ZERO,
            between_albums: Duration::ZERO,
            no_progress_bar: true,
        }
    }

    fn album(url: &str, title: &str) -> AlbumDescriptor {
        AlbumDescriptor {
            url: url.to_string(),
            title: title.to_string(),
        }
    }

    /// An album page whose dialog behaves like the real one: the trigger
    /// shows it, the switch flips the hidden checkbox, and submitting hides
    /// the dialog and (optionally) delivers `archive`.
    fn add_album_page(page: &FakePage, url: &str, title: &str, archive: Option<(PathBuf, usize)>) {
        let flag = |name: &str| format!("{}:{}", url, name);
        page.add_element_on(url, FakeElement::new(&["h1"]).text(title));
        page.add_element_on(
            url,
            FakeElement::new(&["#header-album-download, a[data-target='#dialog-download']"])
                .on_click(Effect::SetFlag(flag("dialog"), true)),
        );
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download"]).visible_when(&flag("dialog")),
        );
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download-org"])
                .hidden()
                .checked_when(&flag("org")),
        );
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download .switchery"])
                .attr("class", "switchery")
                .class_when(&flag("org"), "switchery-on")
                .on_click(Effect::ToggleFlag(flag("org"))),
        );
        let mut submit = FakeElement::new(&["#dialog-download-submit"])
            .on_click(Effect::SetFlag(flag("dialog"), false));
        if let Some((path, size)) = archive {
            submit = submit.on_click(Effect::WriteFile(path, vec![0u8; size]));
        }
        page.add_element_on(url, submit);
    }

    #[tokio::test]
    async fn test_end_to_end_listing_to_archive() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        page.add_element(FakeElement::new(&["a[href*='/album/']"]).attr("href", "/album/1").text("Trip"));
        page.add_element(
            FakeElement::new(&["a[href*='/album/']"])
                .attr("href", "/album/2")
                .text("Veřejná alba"),
        );
        let album_url = "https://eu.zonerama.com/album/1";
        add_album_page(&page, album_url, "Trip", Some((dir.path().join("Trip.zip"), 2048)));

        let site = SiteProfile::default();
        let albums = discover(&page, &site, &[]).await;
        assert_eq!(albums, vec![album(album_url, "Trip")]);

        let token = CancellationToken::new();
        let config = test_config(dir.path());
        let report = run_albums(&page, &site, &config, &albums, LISTING, &token).await;

        assert_eq!(
            report.stats,
            RunStatistics {
                processed: 1,
                downloaded: 1,
                skipped: 0,
                failed: 0
            }
        );
        assert!(!report.interrupted);
        assert_eq!(report.outcomes[0].archive_path, Some(dir.path().join("Trip.zip")));
        assert!(page.flag(&format!("{}:org", album_url)), "originals were not enabled");
        assert_eq!(page.navigations(), vec![album_url.to_string(), LISTING.to_string()]);
    }

    #[tokio::test]
    async fn test_second_run_downloads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("Trip.zip");
        let page = FakePage::new(LISTING);
        let album_url = "https://eu.zonerama.com/album/1";
        add_album_page(&page, album_url, "Trip", Some((archive.clone(), 2048)));
        let albums = vec![album(album_url, "Trip")];
        let site = SiteProfile::default();
        let config = test_config(dir.path());
        let token = CancellationToken::new();

        let first = run_albums(&page, &site, &config, &albums, LISTING, &token).await;
        assert_eq!(first.stats.downloaded, 1);
        let before = std::fs::metadata(&archive).unwrap().modified().unwrap();

        let second = run_albums(&page, &site, &config, &albums, LISTING, &token).await;
        assert_eq!(second.stats.downloaded, 0);
        assert_eq!(second.stats.skipped, 1);
        assert!(matches!(second.outcomes[0].status, DownloadStatus::AlreadyExists));
        assert_eq!(std::fs::metadata(&archive).unwrap().modified().unwrap(), before);
        // The skip happens before any navigation.
        assert_eq!(page.navigations().len(), 2);
    }

    #[tokio::test]
    async fn test_refined_title_is_checked_against_existing_archives() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Léto v Tatrách.zip"), vec![0u8; 2048]).unwrap();
        let page = FakePage::new(LISTING);
        let album_url = "https://eu.zonerama.com/album/5";
        add_album_page(&page, album_url, "Leto v Tatrach", None);

        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &[album(album_url, "Album_1")],
            LISTING,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.outcomes[0].title, "Leto v Tatrach");
        assert_eq!(page.navigations().last().map(String::as_str), Some(LISTING));
    }

    #[tokio::test]
    async fn test_completion_timeout_fails_album_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let slow = "https://eu.zonerama.com/album/1";
        let fine = "https://eu.zonerama.com/album/2";
        add_album_page(&page, slow, "Slow", None);
        add_album_page(&page, fine, "Fine", Some((dir.path().join("Fine.zip"), 4096)));

        let albums = vec![album(slow, "Slow"), album(fine, "Fine")];
        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &albums,
            LISTING,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.stats.processed, 2);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.downloaded, 1);
        match &report.outcomes[0].status {
            DownloadStatus::Failed(e) => {
                assert_eq!(e.phase, Phase::Completion);
                assert!(e.is_timeout());
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_navigation_failure_still_returns_to_listing() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let broken = "https://eu.zonerama.com/album/9";
        page.fail_navigation_to(broken);

        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &[album(broken, "Broken")],
            LISTING,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.stats.failed, 1);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].1.phase, Phase::Navigation);
        assert_eq!(page.navigations(), vec![broken.to_string(), LISTING.to_string()]);
    }

    #[tokio::test]
    async fn test_missing_trigger_fails_in_trigger_phase() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let url = "https://eu.zonerama.com/album/3";
        page.add_element_on(url, FakeElement::new(&["h1"]).text("No button"));

        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &[album(url, "No button")],
            LISTING,
            &CancellationToken::new(),
        )
        .await;

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1.phase, Phase::Trigger);
    }

    #[tokio::test]
    async fn test_fallback_trigger_and_intercepted_click() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let url = "https://eu.zonerama.com/album/4";
        page.add_element_on(
            url,
            FakeElement::new(&[".download-btn"])
                .intercepted()
                .on_click(Effect::SetFlag("dialog".into(), true)),
        );
        page.add_element_on(url, FakeElement::new(&["#dialog-download"]).visible_when("dialog"));
        page.add_element_on(url, FakeElement::new(&["#dialog-download-org"]).checked_when("org"));
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download .btn-primary"])
                .on_click(Effect::SetFlag("dialog".into(), false))
                .on_click(Effect::WriteFile(dir.path().join("Hory.zip"), vec![1u8; 2048])),
        );
        page.set_flag("org", true);

        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &[album(url, "Hory")],
            LISTING,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.stats.downloaded, 1, "{:?}", report.outcomes);
        assert_eq!(page.native_clicks(), 0);
        // trigger (after the blocked native click) and submit
        assert_eq!(page.script_clicks(), 2);
    }

    #[tokio::test]
    async fn test_checkbox_clicked_directly_when_switch_does_not_flip_it() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let url = "https://eu.zonerama.com/album/6";
        page.add_element_on(
            url,
            FakeElement::new(&["#header-album-download, a[data-target='#dialog-download']"])
                .on_click(Effect::SetFlag("dialog".into(), true)),
        );
        page.add_element_on(url, FakeElement::new(&["#dialog-download"]).visible_when("dialog"));
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download-org"])
                .checked_when("org")
                .on_click(Effect::SetFlag("org".into(), true)),
        );
        // A decorative switch that changes nothing.
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download .switchery"]).attr("class", "switchery"),
        );
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download-submit"])
                .on_click(Effect::SetFlag("dialog".into(), false))
                .on_click(Effect::WriteFile(dir.path().join("Sněžka.zip"), vec![1u8; 2048])),
        );

        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &[album(url, "Sněžka")],
            LISTING,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.stats.downloaded, 1);
        assert!(page.flag("org"));
        // switch, checkbox, submit
        assert_eq!(page.script_clicks(), 3);
    }

    #[tokio::test]
    async fn test_interrupt_stops_before_next_album() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let token = CancellationToken::new();
        token.cancel();

        let albums = vec![
            album("https://eu.zonerama.com/album/1", "One"),
            album("https://eu.zonerama.com/album/2", "Two"),
        ];
        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &albums,
            LISTING,
            &token,
        )
        .await;

        assert!(report.interrupted);
        assert_eq!(report.stats.processed, 0);
        assert!(page.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_dialog_that_never_closes_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let url = "https://eu.zonerama.com/album/11";
        page.add_element_on(
            url,
            FakeElement::new(&["#header-album-download, a[data-target='#dialog-download']"])
                .on_click(Effect::SetFlag("dialog".into(), true)),
        );
        page.add_element_on(url, FakeElement::new(&["#dialog-download"]).visible_when("dialog"));
        page.add_element_on(url, FakeElement::new(&["#dialog-download-org"]).checked_when("org"));
        page.set_flag("org", true);
        // Submitting delivers the archive but leaves the dialog on screen.
        page.add_element_on(
            url,
            FakeElement::new(&["#dialog-download-submit"])
                .on_click(Effect::WriteFile(dir.path().join("Krkonoše.zip"), vec![1u8; 2048])),
        );

        let report = run_albums(
            &page,
            &SiteProfile::default(),
            &test_config(dir.path()),
            &[album(url, "Krkonoše")],
            LISTING,
            &CancellationToken::new(),
        )
        .await;

        assert!(page.flag("dialog"));
        assert!(
            matches!(report.outcomes[0].status, DownloadStatus::Completed),
            "{:?}",
            report.outcomes
        );
        assert_eq!(report.outcomes[0].archive_path, Some(dir.path().join("Krkonoše.zip")));
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting_for_archive() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(LISTING);
        let slow = "https://eu.zonerama.com/album/1";
        let next = "https://eu.zonerama.com/album/2";
        add_album_page(&page, slow, "Slow", None);
        add_album_page(&page, next, "Next", Some((dir.path().join("Next.zip"), 4096)));

        let config = DownloadConfig {
            download_timeout: Duration::from_secs(10),
            ..test_config(dir.path())
        };
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let albums = vec![album(slow, "Slow"), album(next, "Next")];
        let report = run_albums(&page, &SiteProfile::default(), &config, &albums, LISTING, &token).await;

        assert!(report.interrupted);
        assert_eq!(report.outcomes.len(), 1);
        match &report.outcomes[0].status {
            DownloadStatus::Failed(e) => {
                assert_eq!(e.phase, Phase::Completion);
                assert!(e.is_interrupted());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        // No return to the listing and the next album is never opened.
        assert_eq!(page.navigations(), vec![slow.to_string()]);
        assert!(!dir.path().join("Next.zip").exists());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(754)), "12m 34s");
        assert_eq!(format_duration(Duration::from_secs(5025)), "1h 23m 45s");
    }

    #[test]
    fn test_create_progress_bar_hidden_when_disabled() {
        let pb = create_progress_bar(true, 100);
        assert!(pb.is_hidden());
    }
}
