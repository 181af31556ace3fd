//! The scraping boundary seen by the orchestrator.
//!
//! Every call is blocking and owns its browser session for exactly its own
//! duration; the session is dropped on every exit path.

use crate::browser::{BrowserConfig, BrowserManager, PageDriver};
use crate::error::ScrapeError;
use crate::extractors::{matches, news, points_table, teams};
use crate::models::{MatchList, NewsFeed, PointsTable, TeamsSnapshot};
use chrono::Utc;

pub trait SiteScraper: Send + Sync {
    fn points_table(&self, year: u16) -> Result<PointsTable, ScrapeError>;

    fn matches(&self, year: u16) -> Result<MatchList, ScrapeError>;

    /// Franchise listing; `year` is only meaningful under a per-year teams policy
    fn teams(&self, year: u16) -> Result<TeamsSnapshot, ScrapeError>;

    fn news(&self, limit: usize) -> Result<NewsFeed, ScrapeError>;

    /// Base URL used for placeholder links
    fn base_url(&self) -> &str;
}

/// Scrapes the live site through headless Chrome
pub struct BrowserSiteScraper {
    manager: BrowserManager,
    base_url: String,
}

impl BrowserSiteScraper {
    pub fn new(manager: BrowserManager, base_url: impl Into<String>) -> Self {
        Self {
            manager,
            base_url: base_url.into(),
        }
    }

    fn with_page<T>(
        &self,
        run: impl FnOnce(&dyn PageDriver, &BrowserConfig) -> Result<T, ScrapeError>,
    ) -> Result<T, ScrapeError> {
        let session = self.manager.create_session()?;
        let page = self.manager.create_page(&session)?;
        let result = run(&page, self.manager.config());
        drop(page);
        self.manager.close_session(session);
        result
    }
}

impl SiteScraper for BrowserSiteScraper {
    fn points_table(&self, year: u16) -> Result<PointsTable, ScrapeError> {
        self.with_page(|page, cfg| points_table::scrape(page, cfg, &self.base_url, year, Utc::now()))
    }

    fn matches(&self, year: u16) -> Result<MatchList, ScrapeError> {
        self.with_page(|page, cfg| matches::scrape(page, cfg, &self.base_url, year, Utc::now()))
    }

    fn teams(&self, year: u16) -> Result<TeamsSnapshot, ScrapeError> {
        log::debug!("Scraping teams page on behalf of {}", year);
        self.with_page(|page, cfg| teams::scrape(page, cfg, &self.base_url, Utc::now()))
    }

    fn news(&self, limit: usize) -> Result<NewsFeed, ScrapeError> {
        self.with_page(|page, cfg| news::scrape(page, cfg, &self.base_url, limit, Utc::now()))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
