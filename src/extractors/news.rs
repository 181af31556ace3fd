//! News extractor with a cascade of fallbacks.
//!
//! The news page has been redesigned several times, so a list of card
//! selectors is tried in order, then a loose scan of headings and
//! paragraphs, and finally a fixed set of placeholder articles. The feed
//! is never empty and its `source` says which path produced it.

use super::{absolute_url, collapse_whitespace, selector, truncate_chars};
use crate::browser::{BrowserConfig, PageDriver};
use crate::error::ScrapeError;
use crate::models::{NewsArticle, NewsFeed};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};

pub const CARD_SELECTORS: &[&str] = &[
    "article",
    ".news-item",
    ".article-item",
    r#"[class*="news"]"#,
    r#"[class*="article"]"#,
    r#"a[href*="/news/"]"#,
];

/// Elements examined per selector
pub const MAX_CARDS: usize = 20;
pub const SUMMARY_LEN: usize = 200;
pub const DEFAULT_LIMIT: usize = 20;

pub const SOURCE_CARDS: &str = "iplt20.com/news";
pub const SOURCE_TEXT: &str = "iplt20.com/news:text";
pub const SOURCE_FALLBACK: &str = "fallback";

const NEWS_KEYWORDS: &[&str] = &["IPL", "match", "player", "team", "win", "score"];

pub fn url_for(base_url: &str) -> String {
    format!("{}/news", base_url.trim_end_matches('/'))
}

pub fn scrape(
    page: &dyn PageDriver,
    browser: &BrowserConfig,
    base_url: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<NewsFeed, ScrapeError> {
    let url = url_for(base_url);
    log::info!("Loading news from {}", url);

    page.navigate(&url)?;
    page.settle(browser.settle());

    let html = page.html()?;
    let (articles, source) = if let Some(found) = card_articles(&html, base_url, now) {
        (found, SOURCE_CARDS)
    } else if let Some(found) = text_articles(&html, now) {
        log::info!("No news cards matched, using heading scan");
        (found, SOURCE_TEXT)
    } else {
        log::warn!("News page yielded nothing usable, serving placeholders");
        (placeholder_articles(base_url, now), SOURCE_FALLBACK)
    };

    Ok(build_feed(articles, source, limit, now))
}

pub fn build_feed(
    mut articles: Vec<NewsArticle>,
    source: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> NewsFeed {
    articles.truncate(limit.max(1));
    NewsFeed {
        total_articles: articles.len(),
        articles,
        last_updated: now,
        source: source.to_string(),
    }
}

/// The first card selector that yields at least one well-formed article
pub fn card_articles(html: &str, base_url: &str, now: DateTime<Utc>) -> Option<Vec<NewsArticle>> {
    let document = Html::parse_document(html);

    CARD_SELECTORS.iter().find_map(|css| {
        let found: Vec<NewsArticle> = document
            .select(&selector(css))
            .take(MAX_CARDS)
            .enumerate()
            .filter_map(|(index, card)| parse_card(card, index, base_url, now))
            .collect();

        if found.is_empty() {
            None
        } else {
            log::debug!("Found {} news articles using selector {}", found.len(), css);
            Some(found)
        }
    })
}

fn parse_card(
    card: ElementRef<'_>,
    index: usize,
    base_url: &str,
    now: DateTime<Utc>,
) -> Option<NewsArticle> {
    let text_of = |el: ElementRef<'_>| collapse_whitespace(&el.text().collect::<String>());
    let first = |css: &str| card.select(&selector(css)).next();

    let title = text_of(first(r#"h1, h2, h3, h4, .title, [class*="title"]"#).unwrap_or(card));
    if !is_valid_title(&title) {
        return None;
    }

    let summary = first(r#"p, .summary, .description, [class*="summary"]"#)
        .map(|el| truncate_chars(&text_of(el), SUMMARY_LEN))
        .unwrap_or_default();

    let link_el = if card.value().name() == "a" {
        Some(card)
    } else {
        first("a")
    };
    let link = link_el
        .and_then(|a| a.value().attr("href"))
        .map(|href| absolute_url(base_url, href))
        .unwrap_or_default();

    let published_date = first(r#"time, .date, [class*="date"]"#)
        .map(|el| {
            let text = text_of(el);
            if text.is_empty() {
                el.value().attr("datetime").unwrap_or_default().to_string()
            } else {
                text
            }
        })
        .unwrap_or_default();

    let image = first("img")
        .and_then(|img| img.value().attr("src"))
        .map(|src| absolute_url(base_url, src))
        .unwrap_or_default();

    Some(NewsArticle {
        id: index as u32 + 1,
        title,
        summary,
        link,
        image,
        published_date,
        category: "News".to_string(),
        extracted: now,
    })
}

pub fn is_valid_title(title: &str) -> bool {
    title.chars().count() > 10 && !title.contains("undefined")
}

/// Loose scan of headings and paragraphs that read like news
pub fn text_articles(html: &str, now: DateTime<Utc>) -> Option<Vec<NewsArticle>> {
    let document = Html::parse_document(html);

    let found: Vec<NewsArticle> = document
        .select(&selector("h1, h2, h3, h4, p"))
        .enumerate()
        .filter_map(|(index, node)| {
            let text = collapse_whitespace(&node.text().collect::<String>());
            let len = text.chars().count();
            if !(21..150).contains(&len) || !NEWS_KEYWORDS.iter().any(|k| text.contains(k)) {
                return None;
            }
            Some(NewsArticle {
                id: index as u32 + 1,
                title: truncate_chars(&text, 100),
                summary: text.chars().skip(100).take(150).collect(),
                link: String::new(),
                image: String::new(),
                published_date: String::new(),
                category: "News".to_string(),
                extracted: now,
            })
        })
        .collect();

    (!found.is_empty()).then_some(found)
}

/// Fixed articles pointing readers at the site sections
pub fn placeholder_articles(base_url: &str, now: DateTime<Utc>) -> Vec<NewsArticle> {
    let base = base_url.trim_end_matches('/');
    let today = now.format("%Y-%m-%d").to_string();
    let year = now.format("%Y").to_string();

    let entries = [
        (
            format!("IPL {}: Tournament Updates Available", year),
            format!(
                "Stay tuned for the latest IPL {} news, match updates, and team announcements.",
                year
            ),
            "news",
            "Tournament Update",
        ),
        (
            "Points Table Updates: Latest Team Standings".to_string(),
            format!(
                "Check the latest points table to see how your favorite teams are performing in IPL {}.",
                year
            ),
            "points-table",
            "Standings",
        ),
        (
            "Match Schedule: Upcoming Fixtures".to_string(),
            "View the complete match schedule and plan your viewing for upcoming IPL matches."
                .to_string(),
            "matches",
            "Fixtures",
        ),
    ];

    entries
        .into_iter()
        .enumerate()
        .map(|(index, (title, summary, path, category))| NewsArticle {
            id: index as u32 + 1,
            title,
            summary,
            link: format!("{}/{}", base, path),
            image: String::new(),
            published_date: today.clone(),
            category: category.to_string(),
            extracted: now,
        })
        .collect()
}

/// Feed served when scraping fails outright and nothing is cached
pub fn fallback_feed(base_url: &str, now: DateTime<Utc>) -> NewsFeed {
    build_feed(
        placeholder_articles(base_url, now),
        SOURCE_FALLBACK,
        DEFAULT_LIMIT,
        now,
    )
}
