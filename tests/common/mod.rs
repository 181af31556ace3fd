// Shared fixtures for integration tests: an in-process site scraper whose
// failures can be switched per season, and sample collections.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use ipl_scraper::cache::{CacheStore, Clock, ManualClock};
use ipl_scraper::config::{CacheConfig, RefreshConfig, TeamsPolicy};
use ipl_scraper::error::ScrapeError;
use ipl_scraper::metrics::MetricsTracker;
use ipl_scraper::models::{
    ColumnMap, MatchList, MatchRecord, NewsArticle, NewsFeed, PointsTable, StandingsRow,
    TeamProfile, TeamsSnapshot,
};
use ipl_scraper::orchestrator::Orchestrator;
use ipl_scraper::site::SiteScraper;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://www.iplt20.com";

pub fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
}

#[derive(Default)]
pub struct FakeScraper {
    failing_years: Mutex<HashSet<u16>>,
    fail_everything: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_year(&self, year: u16) {
        self.failing_years.lock().unwrap().insert(year);
    }

    pub fn clear_failures(&self) {
        self.failing_years.lock().unwrap().clear();
        self.fail_everything(false);
    }

    pub fn fail_everything(&self, fail: bool) {
        self.fail_everything.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn enter(&self, call: String, year: Option<u16>) -> Result<(), ScrapeError> {
        self.calls.lock().unwrap().push(call);
        let year_fails = year.is_some_and(|y| self.failing_years.lock().unwrap().contains(&y));
        if self.fail_everything.load(Ordering::SeqCst) || year_fails {
            Err(ScrapeError::ExtractionTimeout {
                selector: "table".to_string(),
                timeout_secs: 10,
            })
        } else {
            Ok(())
        }
    }
}

impl SiteScraper for FakeScraper {
    fn points_table(&self, year: u16) -> Result<PointsTable, ScrapeError> {
        self.enter(format!("points-table-{}", year), Some(year))?;
        Ok(sample_points_table(year))
    }

    fn matches(&self, year: u16) -> Result<MatchList, ScrapeError> {
        self.enter(format!("matches-{}", year), Some(year))?;
        Ok(sample_matches(year))
    }

    fn teams(&self, year: u16) -> Result<TeamsSnapshot, ScrapeError> {
        self.enter(format!("teams-{}", year), None)?;
        Ok(sample_teams())
    }

    fn news(&self, limit: usize) -> Result<NewsFeed, ScrapeError> {
        self.enter("news".to_string(), None)?;
        let mut feed = sample_news();
        feed.articles.truncate(limit);
        feed.total_articles = feed.articles.len();
        Ok(feed)
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }
}

pub fn sample_points_table(year: u16) -> PointsTable {
    let row = |position: u32, team: &str, points: u32| StandingsRow {
        position,
        team: team.to_string(),
        played: 14,
        won: points / 2,
        lost: 14 - points / 2,
        no_result: 0,
        net_run_rate: 0.5,
        runs_for: "2400/270".to_string(),
        runs_against: "2300/275".to_string(),
        points,
        recent_form: "WLWLW".to_string(),
    };
    let teams = vec![row(1, "GT", 18), row(2, "CSK", 17), row(3, "LSG", 16)];
    PointsTable {
        year,
        total_teams: teams.len(),
        teams,
        last_updated: fixed_now(),
        table_structure: ColumnMap {
            position: Some(0),
            team: Some(1),
            played: Some(2),
            points: Some(9),
            ..ColumnMap::default()
        },
    }
}

pub fn sample_matches(year: u16) -> MatchList {
    let descriptions = [
        "Mumbai Indians won by 6 wickets MI 180/4 (19.2 OV) CSK 178/8 (20 OV)",
        "Match Abandoned RCB KKR",
        "GT vs LSG",
    ];
    MatchList {
        year,
        matches: descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| MatchRecord {
                id: i as u32 + 1,
                description: d.to_string(),
                extracted: fixed_now(),
            })
            .collect(),
        last_updated: fixed_now(),
    }
}

pub fn sample_teams() -> TeamsSnapshot {
    let team = |id: &str, name: &str, short: &str, titles: &str| {
        let total = if titles.is_empty() {
            0
        } else {
            titles.split('|').count() as u32
        };
        TeamProfile {
            id: id.to_string(),
            name: name.to_string(),
            short_name: short.to_string(),
            link: format!("{}/teams/{}", BASE_URL, name.to_lowercase().replace(' ', "-")),
            image: String::new(),
            championships: titles.to_string(),
            total_titles: total,
            is_champion: total > 0,
            extracted: fixed_now(),
        }
    };
    let teams = vec![
        team("1", "Mumbai Indians", "MI", "2013 | 2015 | 2017 | 2019 | 2020"),
        team("2", "Lucknow Super Giants", "LSG", ""),
    ];
    TeamsSnapshot {
        total_teams: teams.len(),
        champion_teams: 1,
        teams,
        last_updated: fixed_now(),
        source: "iplt20.com".to_string(),
    }
}

pub fn sample_news() -> NewsFeed {
    let articles: Vec<NewsArticle> = (1..=3)
        .map(|i| NewsArticle {
            id: i,
            title: format!("Match report number {} from the IPL", i),
            summary: "Summary".to_string(),
            link: format!("{}/news/{}", BASE_URL, i),
            image: String::new(),
            published_date: "2025-05-01".to_string(),
            category: "News".to_string(),
            extracted: fixed_now(),
        })
        .collect();
    NewsFeed {
        total_articles: articles.len(),
        articles,
        last_updated: fixed_now(),
        source: "iplt20.com/news".to_string(),
    }
}

pub fn refresh_config(first_year: u16, last_year: u16) -> RefreshConfig {
    RefreshConfig {
        first_year,
        last_year,
        recent_years: 1,
        interval_minutes: 30,
        delay_min_ms: 0,
        delay_max_ms: 0,
        teams_policy: TeamsPolicy::YearInvariant,
        teams_legacy_before: 2020,
        preload_on_start: false,
        news_limit: 20,
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub cache: Arc<CacheStore>,
    pub scraper: Arc<FakeScraper>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn harness(refresh: RefreshConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(fixed_now().timestamp_millis()));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let cache = Arc::new(CacheStore::new(dyn_clock));
    let scraper = Arc::new(FakeScraper::new());
    let orchestrator = Arc::new(Orchestrator::new(
        cache.clone(),
        scraper.clone(),
        Arc::new(MetricsTracker::new()),
        refresh,
        CacheConfig {
            persist: false,
            ..CacheConfig::default()
        },
    ));
    Harness {
        clock,
        cache,
        scraper,
        orchestrator,
    }
}
