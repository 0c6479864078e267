use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::site::DEFAULT_LOGIN_URL;
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "zonerama-dl",
    version,
    about = "Download your private Zonerama albums as archives",
    after_help = "Log in manually in the browser window that opens; the rest is automatic.\n\
                  Use -ud as a shorthand for --unzip --delete."
)]
pub struct Cli {
    /// Directory archives are saved into
    #[arg(short = 'd', long, default_value = "downloads", env = "ZONERAMA_DOWNLOAD_DIR")]
    pub download_dir: String,

    /// Extract each archive into a directory named after it
    #[arg(short = 'u', long)]
    pub unzip: bool,

    /// Delete archives after extracting them (requires --unzip)
    #[arg(long)]
    pub delete: bool,

    /// Page opened for the manual login
    #[arg(long, default_value = DEFAULT_LOGIN_URL)]
    pub login_url: String,

    /// Album listing to download from. Without it, navigate there yourself
    /// after logging in and press Enter
    #[arg(long)]
    pub listing_url: Option<String>,

    /// Section page whose links are never albums (repeatable)
    #[arg(long = "section-root")]
    pub section_roots: Vec<String>,

    /// Chrome or Chromium binary (default: auto-detect)
    #[arg(long, env = "CHROME")]
    pub chrome_executable: Option<PathBuf>,

    /// Seconds to wait for page elements such as the download button
    #[arg(long, default_value_t = 10)]
    pub element_timeout: u64,

    /// Seconds to wait for the download dialog to close after confirming
    #[arg(long, default_value_t = 60)]
    pub dialog_timeout: u64,

    /// Seconds to wait for an archive to finish downloading
    #[arg(long, default_value_t = 300)]
    pub download_timeout: u64,

    /// Milliseconds between download directory checks
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Smallest file size in bytes accepted as a finished archive
    #[arg(long, default_value_t = 1024)]
    pub min_archive_bytes: u64,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

/// Rewrite the combined `-ud` flag into `-u --delete`. Clap would otherwise
/// read it as `-u` followed by `-d` expecting a directory.
pub fn expand_shorthand<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    for arg in args {
        let arg = arg.into();
        if arg == "-ud" || arg == "-du" {
            out.push(OsString::from("-u"));
            out.push(OsString::from("--delete"));
        } else {
            out.push(arg);
        }
    }
    out
}
