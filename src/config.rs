use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use url::Url;

use crate::browser::chromium::SessionOptions;
use crate::download::DownloadConfig;
use crate::types::LogLevel;

/// Page loads that hang longer than this fail the navigation.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
const SETTLE: Duration = Duration::from_secs(1);
const BETWEEN_ALBUMS: Duration = Duration::from_secs(2);

/// Application configuration, validated from the command line.
pub struct Config {
    /// Always absolute.
    pub download_dir: PathBuf,
    pub login_url: Url,
    pub listing_url: Option<Url>,
    pub section_roots: Vec<Url>,
    pub chrome_executable: Option<PathBuf>,

    pub element_timeout: Duration,
    pub dialog_timeout: Duration,
    pub download_timeout: Duration,
    pub poll_interval: Duration,
    pub min_archive_bytes: u64,

    pub log_level: LogLevel,

    pub unzip: bool,
    pub delete_after_unzip: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("download_dir", &self.download_dir)
            .field("login_url", &self.login_url.as_str())
            .field("listing_url", &self.listing_url.as_ref().map(Url::as_str))
            .field("unzip", &self.unzip)
            .field("delete_after_unzip", &self.delete_after_unzip)
            .field("download_timeout", &self.download_timeout)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn parse_url(flag: &str, raw: &str) -> anyhow::Result<Url> {
    Url::parse(raw).with_context(|| format!("invalid {flag} URL: {raw}"))
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> anyhow::Result<Self> {
        if cli.delete && !cli.unzip {
            anyhow::bail!("--delete requires --unzip");
        }
        if cli.poll_interval_ms == 0 {
            anyhow::bail!("--poll-interval-ms must be greater than zero");
        }

        let mut download_dir = expand_tilde(&cli.download_dir);
        if download_dir.is_relative() {
            download_dir = std::env::current_dir()
                .context("cannot resolve the current directory")?
                .join(download_dir);
        }

        let login_url = parse_url("--login-url", &cli.login_url)?;
        let listing_url = cli
            .listing_url
            .as_deref()
            .map(|raw| parse_url("--listing-url", raw))
            .transpose()?;
        let section_roots = cli
            .section_roots
            .iter()
            .map(|raw| parse_url("--section-root", raw))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            download_dir,
            login_url,
            listing_url,
            section_roots,
            chrome_executable: cli.chrome_executable,
            element_timeout: Duration::from_secs(cli.element_timeout),
            dialog_timeout: Duration::from_secs(cli.dialog_timeout),
            download_timeout: Duration::from_secs(cli.download_timeout),
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
            min_archive_bytes: cli.min_archive_bytes,
            log_level: cli.log_level,
            unzip: cli.unzip,
            delete_after_unzip: cli.delete,
            no_progress_bar: cli.no_progress_bar,
        })
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            directory: self.download_dir.clone(),
            min_archive_bytes: self.min_archive_bytes,
            element_timeout: self.element_timeout,
            dialog_timeout: self.dialog_timeout,
            download_timeout: self.download_timeout,
            poll_interval: self.poll_interval,
            settle: SETTLE,
            between_albums: BETWEEN_ALBUMS,
            no_progress_bar: self.no_progress_bar,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            download_dir: self.download_dir.clone(),
            chrome_executable: self.chrome_executable.clone(),
            navigation_timeout: NAVIGATION_TIMEOUT,
        }
    }
}
