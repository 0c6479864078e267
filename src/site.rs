//! Selectors, labels and URLs describing the gallery site's markup.
//!
//! Everything the crate knows about the remote page structure lives here as
//! data so the cascades can be reordered or extended without touching the
//! orchestration code.

use url::Url;

use crate::browser::selector::selectors;
use crate::browser::Selector;

pub const DEFAULT_LOGIN_URL: &str = "https://eu.zonerama.com/";

/// Public and hidden album sections. Their listings link to each other and
/// those links must not be taken for albums.
const SECTION_ROOTS: &[&str] = &[
    "https://eu.zonerama.com/POLeNo/57347",
    "https://eu.zonerama.com/POLeNo/57348",
];

/// Section-switch link labels that look like albums but are not.
pub const NAVIGATION_LABELS: &[&str] = &[
    "Veřejná alba",
    "Skrytá alba",
    "Public albums",
    "Hidden albums",
    "inzerce",
    "advertisement",
];

/// Listing-page album link strategies, highest priority first.
pub const ALBUM_LINK_STRATEGIES: &[&str] = &[
    "a[href*='/album/']",
    "a[href*='/POLeNo/']",
    ".album-link",
    ".album-item a",
    "[data-testid='album-link']",
    "a[title]",
];

const COOKIE_ACCEPT: &str = "button[data-action='accept-all']";

const DOWNLOAD_TRIGGER: &str = "#header-album-download, a[data-target='#dialog-download']";

const DOWNLOAD_TRIGGER_FALLBACKS: &[&str] = &[
    "a.share-a[data-ajax-url*='DownloadAlbum']",
    "//a[contains(@data-ajax-url, 'DownloadAlbum')]",
    "//button[contains(text(), 'Stáhnout')]",
    "//a[contains(text(), 'Stáhnout')]",
    "//button[contains(text(), 'Download')]",
    "//a[contains(text(), 'Download')]",
    "[data-testid='download-button']",
    ".download-btn",
    ".download-button",
];

const ALBUM_TITLE: &[&str] = &[
    ".album-title",
    "#album-title",
    "[data-testid='album-title']",
    "h1",
];

const DIALOG: &str = "#dialog-download";
const ORIGINALS_CHECKBOX: &str = "#dialog-download-org";
const ORIGINALS_SWITCH: &str = "#dialog-download .switchery";
const DIALOG_SUBMIT: &str = "#dialog-download-submit";

const DIALOG_SUBMIT_FALLBACKS: &[&str] = &[
    "//button[contains(text(), 'Stáhnout') and not(contains(text(), 'originály'))]",
    "#dialog-download button.btn-success",
    "#dialog-download .btn-primary",
];

/// Class a switch control carries while it is on.
pub const SWITCH_ON_CLASS: &str = "switchery-on";

/// Parsed selectors for one site layout.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub body: Selector,
    pub cookie_accept: Selector,
    pub album_links: Vec<Selector>,
    pub all_links: Selector,
    pub navigation_labels: Vec<String>,
    pub section_roots: Vec<Url>,
    pub album_title: Vec<Selector>,
    pub download_trigger: Selector,
    pub download_trigger_fallbacks: Vec<Selector>,
    pub dialog: Selector,
    pub originals_checkbox: Selector,
    pub originals_switch: Selector,
    pub dialog_submit: Selector,
    pub dialog_submit_fallbacks: Vec<Selector>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            body: Selector::parse("body"),
            cookie_accept: Selector::parse(COOKIE_ACCEPT),
            album_links: selectors(ALBUM_LINK_STRATEGIES),
            all_links: Selector::parse("a"),
            navigation_labels: NAVIGATION_LABELS.iter().map(|s| s.to_string()).collect(),
            section_roots: SECTION_ROOTS.iter().filter_map(|s| Url::parse(s).ok()).collect(),
            album_title: selectors(ALBUM_TITLE),
            download_trigger: Selector::parse(DOWNLOAD_TRIGGER),
            download_trigger_fallbacks: selectors(DOWNLOAD_TRIGGER_FALLBACKS),
            dialog: Selector::parse(DIALOG),
            originals_checkbox: Selector::parse(ORIGINALS_CHECKBOX),
            originals_switch: Selector::parse(ORIGINALS_SWITCH),
            dialog_submit: Selector::parse(DIALOG_SUBMIT),
            dialog_submit_fallbacks: selectors(DIALOG_SUBMIT_FALLBACKS),
        }
    }
}

impl SiteProfile {
    /// True when `title` contains a navigation label, ignoring case.
    pub fn is_navigation_label(&self, title: &str) -> bool {
        let lowered = title.to_lowercase();
        self.navigation_labels
            .iter()
            .any(|label| lowered.contains(&label.to_lowercase()))
    }
}
