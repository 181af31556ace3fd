//! Match results extractor.
//!
//! Primary strategy reads the result cards; when the site drops that class
//! the page text is scanned for fixture-looking lines instead.

use super::selector;
use crate::browser::{BrowserConfig, PageDriver};
use crate::error::ScrapeError;
use crate::models::{MatchList, MatchRecord};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use std::time::Duration;

pub const MATCH_CONTAINER: &str = ".vn-shedule-desk";

static TEAM_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{2,4}.*[A-Z]{2,4}").unwrap());

pub fn url_for(base_url: &str, year: u16) -> String {
    format!("{}/matches/results/{}", base_url.trim_end_matches('/'), year)
}

pub fn scrape(
    page: &dyn PageDriver,
    browser: &BrowserConfig,
    base_url: &str,
    year: u16,
    now: DateTime<Utc>,
) -> Result<MatchList, ScrapeError> {
    let url = url_for(base_url, year);
    log::info!("Loading matches for {} from {}", year, url);

    page.navigate(&url)?;
    page.settle(browser.settle());
    // Cards render late; absence just means the text fallback runs
    if let Err(e) = page.wait_for_selector(MATCH_CONTAINER, Duration::from_secs(5)) {
        log::debug!("{}", e);
    }

    let html = page.html()?;
    let descriptions = match container_descriptions(&html) {
        Some(found) => found,
        None => {
            log::warn!(
                "No {} elements for {}, scanning page text instead",
                MATCH_CONTAINER,
                year
            );
            text_line_descriptions(&page.visible_text()?).unwrap_or_default()
        }
    };

    if descriptions.is_empty() {
        log::info!("{}", ScrapeError::UpstreamEmpty(format!("matches for {}", year)));
    }

    Ok(MatchList {
        year,
        matches: build_records(descriptions, now),
        last_updated: now,
    })
}

/// Text of every result card, if the page has any
///
/// Card text is only trimmed; line breaks inside a card are kept as rendered.
pub fn container_descriptions(html: &str) -> Option<Vec<String>> {
    let document = Html::parse_document(html);
    let found: Vec<String> = document
        .select(&selector(MATCH_CONTAINER))
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    (!found.is_empty()).then_some(found)
}

/// Lines of rendered text that look like fixtures
pub fn text_line_descriptions(text: &str) -> Option<Vec<String>> {
    let found: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| line.contains("vs") || line.contains("V/S") || TEAM_PAIR.is_match(line))
        .map(str::to_string)
        .collect();

    (!found.is_empty()).then_some(found)
}

pub fn build_records(descriptions: Vec<String>, extracted: DateTime<Utc>) -> Vec<MatchRecord> {
    descriptions
        .into_iter()
        .enumerate()
        .map(|(index, description)| MatchRecord {
            id: index as u32 + 1,
            description,
            extracted,
        })
        .collect()
}
