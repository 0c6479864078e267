use std::collections::HashSet;

use url::Url;

use crate::browser::{PageDriver, Selector};
use crate::site::SiteProfile;

/// Links shown by the diagnostic dump when no strategy matches.
const LINK_DUMP_LIMIT: usize = 20;

/// Below this many albums discovery mentions the page may be under-loaded.
const FEW_ALBUMS_HINT: usize = 100;

/// One album found on the listing page. Identity is `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDescriptor {
    pub url: String,
    pub title: String,
}

/// Raw attributes of one matched link, read before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkCandidate {
    pub href: Option<String>,
    pub title_attr: Option<String>,
    pub text: String,
}

impl LinkCandidate {
    fn label(&self) -> String {
        self.title_attr
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.text.trim())
            .to_string()
    }
}

/// Where discovery is running: the page URL relative links resolve
/// against, plus section pages that must never be treated as albums.
#[derive(Debug, Clone)]
pub struct ListingContext {
    pub page_url: Url,
    pub section_roots: Vec<Url>,
}

impl ListingContext {
    pub fn new(page_url: Url, section_roots: Vec<Url>) -> Self {
        Self {
            page_url,
            section_roots,
        }
    }

    fn is_self_reference(&self, target: &Url) -> bool {
        if strip_fragment(target) == strip_fragment(&self.page_url) {
            return true;
        }
        std::iter::once(&self.page_url)
            .chain(self.section_roots.iter())
            .any(|root| {
                root.host_str() == target.host_str() && same_path(root.path(), target.path())
            })
    }
}

fn strip_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

fn same_path(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Album pages live under `/album/`; private section listings under
/// `/POLeNo/` only count when they carry an access secret.
pub fn is_album_href(url: &Url) -> bool {
    let path = url.path();
    if path.contains("/album/") {
        return true;
    }
    path.contains("/POLeNo/") && url.query_pairs().any(|(key, _)| key == "secret")
}

/// Turn the candidates of a single strategy into album descriptors.
///
/// Navigation labels, non-album links and links back to the listing or one
/// of its sections are dropped; repeated URLs keep their first occurrence.
pub fn select_albums(
    candidates: &[LinkCandidate],
    site: &SiteProfile,
    context: &ListingContext,
) -> Vec<AlbumDescriptor> {
    let mut albums: Vec<AlbumDescriptor> = Vec::new();
    let mut seen = HashSet::new();

    for candidate in candidates {
        let label = candidate.label();
        if site.is_navigation_label(&label) {
            tracing::debug!(title = %label, "Skipping navigation link");
            continue;
        }
        let Some(href) = candidate.href.as_deref().map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let Ok(target) = context.page_url.join(href) else {
            tracing::debug!(href, "Skipping unparseable link");
            continue;
        };
        if !is_album_href(&target) || context.is_self_reference(&target) {
            continue;
        }
        let url = strip_fragment(&target).to_string();
        if !seen.insert(url.clone()) {
            continue;
        }
        let title = if label.is_empty() {
            format!("Album_{}", albums.len() + 1)
        } else {
            label
        };
        albums.push(AlbumDescriptor { url, title });
    }

    albums
}

async fn read_candidates<P>(page: &P, selector: &Selector) -> Vec<LinkCandidate>
where
    P: PageDriver + ?Sized,
{
    let mut candidates = Vec::new();
    for element in page.find_all(selector).await {
        // A link that went stale between query and read is simply skipped.
        let Ok(href) = page.attribute(&element, "href").await else {
            continue;
        };
        let title_attr = page.attribute(&element, "title").await.ok().flatten();
        let text = page.text(&element).await.unwrap_or_default();
        candidates.push(LinkCandidate {
            href,
            title_attr,
            text,
        });
    }
    candidates
}

/// Resolve the albums on the loaded listing page. `section_roots` adds to
/// the site's own sections.
///
/// Strategies are tried in priority order and discovery commits to the
/// first one whose filtered result is non-empty. When none is productive
/// the page's links are logged for diagnosis and an empty list is returned.
pub async fn discover<P>(page: &P, site: &SiteProfile, section_roots: &[Url]) -> Vec<AlbumDescriptor>
where
    P: PageDriver + ?Sized,
{
    let page_url = match page.current_url().await.map(|u| Url::parse(&u)) {
        Ok(Ok(url)) => url,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Listing page URL is not parseable; no albums discovered");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not read listing page URL; no albums discovered");
            return Vec::new();
        }
    };
    let mut roots = site.section_roots.clone();
    roots.extend_from_slice(section_roots);
    let context = ListingContext::new(page_url, roots);

    for strategy in &site.album_links {
        let candidates = read_candidates(page, strategy).await;
        if candidates.is_empty() {
            continue;
        }
        tracing::debug!(selector = %strategy, matched = candidates.len(), "strategy matched elements");

        let albums = select_albums(&candidates, site, &context);
        if albums.is_empty() {
            continue;
        }
        tracing::info!(selector = %strategy, albums = albums.len(), "Discovered albums");
        if albums.len() < FEW_ALBUMS_HINT {
            tracing::debug!(
                albums = albums.len(),
                "Few albums found; if some are missing the listing may not have finished loading"
            );
        }
        return albums;
    }

    dump_links(page, site).await;
    Vec::new()
}

async fn dump_links<P>(page: &P, site: &SiteProfile)
where
    P: PageDriver + ?Sized,
{
    tracing::warn!("No albums found with any selector; listing page links follow");
    let mut relevant = Vec::new();
    for element in page.find_all(&site.all_links).await {
        let Ok(Some(href)) = page.attribute(&element, "href").await else {
            continue;
        };
        let text = page.text(&element).await.unwrap_or_default();
        let text = text.trim();
        if text.is_empty() || site.is_navigation_label(text) {
            continue;
        }
        relevant.push((text.to_string(), href));
    }

    for (text, href) in relevant.iter().take(LINK_DUMP_LIMIT) {
        tracing::info!("Link: {} -> {}", text, href);
    }
    if relevant.len() > LINK_DUMP_LIMIT {
        tracing::info!("... and {} more links", relevant.len() - LINK_DUMP_LIMIT);
    }
}
