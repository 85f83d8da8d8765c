// Extracts announcements from the notice board HTML.

use crate::model::Announcement;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Parsing settings derived from the config.
pub struct LinkFilter<'a> {
    /// Page the links were found on; relative hrefs are appended to it.
    pub base_url: &'a str,
    /// Scheme and host of `base_url`; root-relative hrefs are appended to it.
    pub origin: String,
    pub keywords: &'a [String],
}

impl<'a> LinkFilter<'a> {
    pub fn new(base_url: &'a str, keywords: &'a [String]) -> Self {
        let origin = url::Url::parse(base_url)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|_| base_url.trim_end_matches('/').to_string());
        LinkFilter {
            base_url,
            origin,
            keywords,
        }
    }

    pub fn is_announcement(&self, text: &str, href: &str) -> bool {
        if text.is_empty() || href.is_empty() {
            return false;
        }
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn full_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{}", self.origin, href)
        } else {
            format!("{}{}", self.base_url, href)
        }
    }
}

/// Every keyword-matching `<a href>` on the page, deduplicated by id.
pub fn parse_announcements(html: &str, filter: &LinkFilter<'_>, scraped_at: &str) -> Vec<Announcement> {
    let document = Html::parse_document(html);
    let Ok(links) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for link in document.select(&links) {
        let href = link.value().attr("href").unwrap_or_default().trim();
        let text: String = link.text().map(str::trim).collect();
        if !filter.is_announcement(&text, href) {
            continue;
        }
        let ann = Announcement::new(text, filter.full_url(href), scraped_at.to_string());
        if seen.insert(ann.id.clone()) {
            out.push(ann);
        }
    }
    out
}
