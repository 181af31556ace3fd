//! Extractors turn a rendered page into a validated collection for one data kind.
//!
//! Each extractor has a thin `scrape` entry point that drives a
//! [`PageDriver`](crate::browser::PageDriver) and a set of pure functions over
//! HTML/text that do the actual normalization, so the parsing logic can be
//! exercised against recorded fixtures.

pub mod matches;
pub mod news;
pub mod points_table;
pub mod teams;

use scraper::Selector;

/// Parse a selector that is known to be valid at compile time
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector '{}': {}", css, e))
}

/// Collapse runs of whitespace into single spaces and trim
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max` characters of `text`, respecting char boundaries
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Resolve an href against the site base URL
pub(crate) fn absolute_url(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        let path = if href.starts_with('/') {
            href.to_string()
        } else {
            format!("/{}", href)
        };
        format!("{}{}", base_url.trim_end_matches('/'), path)
    }
}
