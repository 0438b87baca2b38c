//! Gallery id extraction and URL list parsing.

use regex::Regex;
use std::sync::OnceLock;

static RE_GALLERY: OnceLock<Regex> = OnceLock::new();

fn re_gallery() -> &'static Regex {
    // The id is the run of digits right before `.html`, e.g.
    // https://hitomi.la/galleries/1401451.html or /doujinshi/some-title-1401451.html
    RE_GALLERY.get_or_init(|| {
        Regex::new(r"^https?://.*[^0-9]([0-9]+)\.html").expect("compile RE_GALLERY")
    })
}

pub fn parse_gallery_id(url: &str) -> Option<String> {
    let trimmed = url.trim();
    re_gallery()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// One URL per line; blank lines and surrounding whitespace are dropped.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
