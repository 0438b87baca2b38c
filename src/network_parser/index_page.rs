//! Index-page lookup: page URL -> (gallery URL, title).
//!
//! Two page shapes are understood:
//! - mirror index pages, which link to the gallery with an anchor whose text is
//!   the gallery host and carry the title in `h2.title_jp` / `h2.title_en`
//! - the gallery's own page, titled by `div.gallery h1 a`

use reqwest::Url;
use reqwest::header::HeaderMap;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::transport::HttpTransport;
use crate::base_system::context::FetchSettings;
use crate::base_system::retry::{RetryFailure, Sleeper};
use crate::download::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub target_url: String,
    pub title: String,
}

pub trait IndexResolver {
    fn resolve(&self, page_url: &str) -> Result<IndexEntry, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IndexMode {
    /// Gallery-host pages are read directly, anything else as a mirror index.
    #[default]
    Auto,
    Direct,
    Mirror,
}

pub struct WebIndexResolver<'a> {
    transport: &'a dyn HttpTransport,
    sleeper: &'a dyn Sleeper,
    settings: &'a FetchSettings,
    mode: IndexMode,
}

impl<'a> WebIndexResolver<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        sleeper: &'a dyn Sleeper,
        settings: &'a FetchSettings,
        mode: IndexMode,
    ) -> Self {
        Self {
            transport,
            sleeper,
            settings,
            mode,
        }
    }

    fn effective_mode(&self, page_url: &str) -> IndexMode {
        match self.mode {
            IndexMode::Auto => {
                let on_gallery_host = Url::parse(page_url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .is_some_and(|host| is_same_site(&host, &self.settings.cdn_host));
                if on_gallery_host {
                    IndexMode::Direct
                } else {
                    IndexMode::Mirror
                }
            }
            mode => mode,
        }
    }

    fn fetch_page(&self, page_url: &str) -> Result<String, FetchError> {
        self.settings
            .retry
            .run(self.sleeper, |_| {
                self.transport
                    .get(page_url, HeaderMap::new())
                    .and_then(|fetched| fetched.read_text(page_url))
            })
            .map_err(RetryFailure::into_last)
    }
}

impl IndexResolver for WebIndexResolver<'_> {
    fn resolve(&self, page_url: &str) -> Result<IndexEntry, FetchError> {
        let page_url = page_url.trim();
        let html = self.fetch_page(page_url).map_err(|err| {
            warn!("failed to get {}: {}", page_url, err);
            FetchError::Resolution {
                url: page_url.to_string(),
                reason: err.to_string(),
            }
        })?;

        let mode = self.effective_mode(page_url);
        debug!("reading {} as {:?} page", page_url, mode);
        let (target, title) = match mode {
            IndexMode::Mirror => {
                let (href, title) = parse_mirror_page(&html, &self.settings.index_link_text);
                (href.and_then(|h| absolutize(page_url, &h)), title)
            }
            _ => (Some(page_url.to_string()), parse_gallery_page(&html)),
        };

        let missing = |what: &str| FetchError::Resolution {
            url: page_url.to_string(),
            reason: format!("no {what} on page"),
        };
        let target_url = target.ok_or_else(|| missing("gallery link"))?;
        let title = title.ok_or_else(|| missing("title"))?;
        info!("found {} -> {}", title, target_url);
        Ok(IndexEntry { target_url, title })
    }
}

/// (href of the first anchor whose text is `link_text`, title)
pub fn parse_mirror_page(html: &str, link_text: &str) -> (Option<String>, Option<String>) {
    let doc = Html::parse_document(html);

    let anchors: Vec<ElementRef> = select(&doc, "a")
        .into_iter()
        .filter(|a| element_text(a) == link_text)
        .collect();
    if anchors.len() > 1 {
        warn!("found {} matching links, using the first", anchors.len());
    }
    let href = anchors
        .first()
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    // Without a Japanese title the English slot holds the original one.
    let title = first_text(&doc, "h2.title_jp").or_else(|| first_text(&doc, "h2.title_en"));
    (href, title)
}

pub fn parse_gallery_page(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    first_text(&doc, "div.gallery h1 a")
}

fn select<'d>(doc: &'d Html, css: &str) -> Vec<ElementRef<'d>> {
    match Selector::parse(css) {
        Ok(sel) => doc.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    select(doc, css)
        .first()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// `host` is `site` itself or one of its subdomains.
fn is_same_site(host: &str, site: &str) -> bool {
    host == site
        || host
            .strip_suffix(site)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn absolutize(base: &str, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(u) => Some(u.to_string()),
        Err(_) => Url::parse(base)
            .and_then(|b| b.join(href))
            .ok()
            .map(|u| u.to_string()),
    }
}
