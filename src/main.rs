//! zonerama-dl: downloads private Zonerama albums as ZIP archives.
//!
//! The operator logs in through a real Chromium window; from there the
//! listing is scrolled until stable, album links are discovered, and each
//! album is driven through the site's download dialog. Archives already on
//! disk are skipped, so interrupted runs can simply be restarted. Completed
//! archives can optionally be extracted afterwards.

#![warn(clippy::all)]

mod archive;
mod browser;
mod cli;
mod config;
mod console;
mod download;
mod listing;
mod poll;
mod shutdown;
mod site;
mod types;

use std::io::IsTerminal;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use browser::wait::wait_for;
use browser::{ChromiumSession, Condition, PageDriver};
use config::Config;
use console::Console;
use download::RunReport;
use listing::ScrollPlan;
use site::SiteProfile;

/// After an interrupt, ask whether the archives finished so far should be
/// extracted. Without a terminal there is nobody to ask.
async fn confirm_post_process(console: &mut Console) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    println!("Extract the archives downloaded so far? [y/N]");
    let answer = console.read_line(None).await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Log in, find the listing and download every album on it. `None` means
/// the run was interrupted before any album was attempted.
async fn download_albums<P>(
    page: &P,
    config: &Config,
    plan: &ScrollPlan,
    console: &mut Console,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<RunReport>>
where
    P: PageDriver + ?Sized,
{
    let site = SiteProfile::default();
    let download_config = config.download_config();

    page.navigate(config.login_url.as_str())
        .await
        .context("could not open the login page")?;
    wait_for(page, &site.body, Condition::Present, &download_config.element_poll(), cancel)
        .await
        .context("login page did not load")?;

    if console
        .prompt("Log in to Zonerama in the browser window, then press Enter here.", cancel)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    let listing_url = match &config.listing_url {
        Some(url) => {
            page.navigate(url.as_str())
                .await
                .context("could not open the album listing")?;
            url.clone()
        }
        None => {
            if console
                .prompt("Open the album listing to download, then press Enter here.", cancel)
                .await?
                .is_none()
            {
                return Ok(None);
            }
            let current = page.current_url().await.context("could not read the listing URL")?;
            Url::parse(&current).with_context(|| format!("unexpected listing URL: {current}"))?
        }
    };
    tracing::info!(listing = %listing_url, "Using album listing");

    listing::accept_cookies(page, &site, cancel).await;

    let stabilization = listing::stabilize(page, plan, cancel).await;
    if stabilization.interrupted {
        return Ok(None);
    }
    if !stabilization.is_complete() {
        tracing::warn!(
            failures = stabilization.script_failures,
            scripts = stabilization.scripts_run,
            "Listing may not be fully loaded"
        );
    }

    let mut section_roots = vec![listing_url.clone()];
    section_roots.extend(config.section_roots.iter().cloned());
    let albums = listing::discover(page, &site, &section_roots).await;
    if albums.is_empty() {
        tracing::warn!("No albums found on {}", listing_url);
    } else {
        let retrieved = albums
            .iter()
            .filter(|a| download::dedup::is_already_retrieved(&config.download_dir, &a.title))
            .count();
        tracing::info!("Found {} albums ({} already retrieved)", albums.len(), retrieved);
    }

    let report = download::run_albums(
        page,
        &site,
        &download_config,
        &albums,
        listing_url.as_str(),
        cancel,
    )
    .await;
    Ok(Some(report))
}

/// Everything after the browser is up. The page is closed exactly once,
/// whether the run succeeds, fails or is interrupted.
async fn run_session<P>(
    page: &P,
    config: &Config,
    plan: &ScrollPlan,
    console: &mut Console,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<RunReport>>
where
    P: PageDriver + ?Sized,
{
    let result = download_albums(page, config, plan, console, cancel).await;
    page.close().await;
    result
}

async fn run(config: Config) -> anyhow::Result<i32> {
    tracing::info!(?config, "Starting zonerama-dl");
    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| format!("cannot create {}", config.download_dir.display()))?;

    let cancel = shutdown::install_signal_handler();
    let mut console = Console::stdin();

    let session = ChromiumSession::open(&config.session_options())
        .await
        .context("could not start the browser")?;
    let report = run_session(&session, &config, &ScrollPlan::default(), &mut console, &cancel).await?;

    let interrupted = report.as_ref().map_or(true, |r| r.interrupted) || cancel.is_cancelled();
    let mut failed = false;
    if let Some(report) = &report {
        download::log_summary(report, &config.download_dir);
        failed |= report.stats.failed > 0;
    }

    if config.unzip {
        let extract = if interrupted {
            confirm_post_process(&mut console).await?
        } else {
            true
        };
        if extract {
            let extraction =
                archive::post_process_blocking(config.download_dir.clone(), config.delete_after_unzip)
                    .await?;
            archive::log_report(&extraction);
            failed |= !extraction.is_success();
        }
    }

    Ok(if interrupted {
        shutdown::INTERRUPTED_EXIT_CODE
    } else if failed {
        1
    } else {
        0
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse_from(cli::expand_shorthand(std::env::args_os()));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = Config::from_cli(cli)?;
    // Exit here rather than return: an abandoned stdin read would otherwise
    // hold up runtime shutdown until the operator presses Enter.
    let code = match run(config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    };
    std::process::exit(code);
}
