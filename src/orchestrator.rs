//! Refresh orchestration.
//!
//! All scrapes go through [`Orchestrator::scrape`], which serializes them
//! behind a single gate and runs the blocking browser work on tokio's
//! blocking pool. Readers never wait on the gate: they read the cache.
//!
//! Failure policy for a key:
//! - a good entry that is still valid is left untouched
//! - a good entry that has expired is re-stored for `ttl_error_minutes`,
//!   so stale data stays available until the next attempt
//! - otherwise an error-shaped entry is stored (placeholder articles for news)

use crate::cache::{CacheEntry, CacheStore, CachedData};
use crate::config::{CacheConfig, RefreshConfig, TeamsPolicy};
use crate::error::ScrapeError;
use crate::extractors::news;
use crate::metrics::{track_scrape, MetricsTracker};
use crate::models::{DataKind, ScrapeFailure};
use crate::site::SiteScraper;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorState {
    Idle,
    Preloading,
    Ready,
    Refreshing,
}

/// One scrape: a data kind, and a season for the per-year kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    PointsTable(u16),
    Matches(u16),
    Teams(u16),
    News,
}

impl Target {
    pub fn new(kind: DataKind, year: u16) -> Self {
        match kind {
            DataKind::PointsTable => Target::PointsTable(year),
            DataKind::Matches => Target::Matches(year),
            DataKind::Teams => Target::Teams(year),
            DataKind::News => Target::News,
        }
    }

    pub fn kind(&self) -> DataKind {
        match self {
            Target::PointsTable(_) => DataKind::PointsTable,
            Target::Matches(_) => DataKind::Matches,
            Target::Teams(_) => DataKind::Teams,
            Target::News => DataKind::News,
        }
    }

    pub fn year(&self) -> Option<u16> {
        match *self {
            Target::PointsTable(y) | Target::Matches(y) | Target::Teams(y) => Some(y),
            Target::News => None,
        }
    }

    pub fn cache_key(&self) -> String {
        self.kind().cache_key(self.year())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailedKey {
    pub key: String,
    pub category: String,
    pub error: String,
}

/// What a refresh pass did
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<FailedKey>,
    /// Another preload was already running, nothing was done
    pub skipped: bool,
}

impl RefreshReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    fn record(&mut self, key: String, result: &Result<Arc<CacheEntry>, ScrapeError>) {
        match result {
            Ok(_) => self.refreshed.push(key),
            Err(e) => self.failed.push(FailedKey {
                key,
                category: e.category().to_string(),
                error: e.to_string(),
            }),
        }
    }

    fn merge(&mut self, other: RefreshReport) {
        self.refreshed.extend(other.refreshed);
        self.failed.extend(other.failed);
    }

    pub fn is_success(&self) -> bool {
        !self.skipped && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindCoverage {
    pub kind: DataKind,
    pub loaded: usize,
    pub total: usize,
    pub loaded_years: Vec<u16>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub state: OrchestratorState,
    pub years: Vec<u16>,
    pub recent_years: Vec<u16>,
    pub kinds: Vec<KindCoverage>,
    pub news_loaded: bool,
    pub last_preload: Option<DateTime<Utc>>,
    pub refresh_interval_minutes: u64,
}

/// Resets the preload flag however the preload ends
struct PreloadGuard<'a>(&'a AtomicBool);

impl Drop for PreloadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    cache: Arc<CacheStore>,
    scraper: Arc<dyn SiteScraper>,
    metrics: Arc<MetricsTracker>,
    refresh: RefreshConfig,
    cache_config: CacheConfig,
    state: Mutex<OrchestratorState>,
    preloading: AtomicBool,
    scrape_gate: tokio::sync::Mutex<()>,
    last_preload: Mutex<Option<DateTime<Utc>>>,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<CacheStore>,
        scraper: Arc<dyn SiteScraper>,
        metrics: Arc<MetricsTracker>,
        refresh: RefreshConfig,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            cache,
            scraper,
            metrics,
            refresh,
            cache_config,
            state: Mutex::new(OrchestratorState::Idle),
            preloading: AtomicBool::new(false),
            scrape_gate: tokio::sync::Mutex::new(()),
            last_preload: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsTracker> {
        &self.metrics
    }

    pub fn refresh_config(&self) -> &RefreshConfig {
        &self.refresh
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(OrchestratorState::Idle)
    }

    fn set_state(&self, state: OrchestratorState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    pub fn is_preloading(&self) -> bool {
        self.preloading.load(Ordering::SeqCst)
    }

    /// TTL in minutes for a target's cache entry
    pub fn ttl_for(&self, target: Target) -> u64 {
        match target.year() {
            None => self.cache_config.ttl_news_minutes,
            Some(year) if self.refresh.is_recent(year) => self.cache_config.ttl_recent_minutes,
            Some(_) => self.cache_config.ttl_historical_minutes,
        }
    }

    async fn pause(&self) {
        let delay = random_delay(self.refresh.delay_min_ms, self.refresh.delay_max_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run one scrape on the blocking pool; scrapes never overlap
    pub async fn scrape(&self, target: Target) -> Result<CachedData, ScrapeError> {
        let _gate = self.scrape_gate.lock().await;

        let scraper = self.scraper.clone();
        let metrics = self.metrics.clone();
        let news_limit = self.refresh.news_limit;

        tokio::task::spawn_blocking(move || {
            track_scrape(&metrics, target.kind(), || match target {
                Target::PointsTable(year) => scraper.points_table(year).map(CachedData::PointsTable),
                Target::Matches(year) => scraper.matches(year).map(CachedData::Matches),
                Target::Teams(year) => scraper.teams(year).map(CachedData::Teams),
                Target::News => scraper.news(news_limit).map(CachedData::News),
            })
        })
        .await
        .map_err(|e| ScrapeError::Browser(format!("scrape task failed: {}", e)))?
    }

    /// Scrape a target and store the outcome under its key
    pub async fn refresh_target(&self, target: Target) -> Result<Arc<CacheEntry>, ScrapeError> {
        let key = target.cache_key();
        match self.scrape(target).await {
            Ok(data) => {
                log::info!("Refreshed {}", key);
                Ok(self.cache.set(&key, data, self.ttl_for(target)))
            }
            Err(e) => {
                self.store_failure(&key, target.kind(), &e);
                Err(e)
            }
        }
    }

    fn store_failure(&self, key: &str, kind: DataKind, error: &ScrapeError) {
        let now = self.cache.now_ms();
        let error_ttl = self.cache_config.ttl_error_minutes;

        match self.cache.peek(key) {
            Some(existing) if existing.data.is_good() && existing.is_valid(now) => {
                log::warn!("Refresh of {} failed, keeping cached data: {}", key, error);
            }
            Some(existing) if existing.data.is_good() => {
                log::warn!("Refresh of {} failed, serving stale data: {}", key, error);
                self.cache.set(key, existing.data.clone(), error_ttl);
            }
            _ if kind == DataKind::News => {
                log::warn!("News scrape failed with nothing cached, storing placeholders: {}", error);
                let feed = news::fallback_feed(self.scraper.base_url(), Utc::now());
                self.cache.set(key, CachedData::News(feed), error_ttl);
            }
            _ => {
                log::error!("Scrape of {} failed: {}", key, error);
                let failure = ScrapeFailure {
                    category: error.category().to_string(),
                    message: error.to_string(),
                    failed_at: Utc::now(),
                };
                self.cache.set(key, CachedData::Failed(failure), error_ttl);
            }
        }
    }

    fn mark_unavailable(&self, year: u16) -> Arc<CacheEntry> {
        let key = DataKind::Teams.cache_key(Some(year));
        let reason = format!(
            "Team data is not available for seasons before {}",
            self.refresh.teams_legacy_before
        );
        self.cache.set(
            &key,
            CachedData::Unavailable { reason },
            self.cache_config.ttl_historical_minutes,
        )
    }

    /// Scrape the teams page once and store it under every season in `years`
    async fn refresh_shared_teams(&self, years: &[u16]) -> Result<(), ScrapeError> {
        let source_year = years.iter().copied().max().unwrap_or(self.refresh.last_year);
        match self.scrape(Target::Teams(source_year)).await {
            Ok(data) => {
                for &year in years {
                    let target = Target::Teams(year);
                    self.cache.set(&target.cache_key(), data.clone(), self.ttl_for(target));
                }
                log::info!("Stored shared team listing for {} seasons", years.len());
                Ok(())
            }
            Err(e) => {
                for &year in years {
                    self.store_failure(&Target::Teams(year).cache_key(), DataKind::Teams, &e);
                }
                Err(e)
            }
        }
    }

    /// Refresh teams for `years` according to the teams policy
    async fn refresh_teams(&self, years: &[u16]) -> RefreshReport {
        let mut report = RefreshReport::default();

        match self.refresh.teams_policy {
            TeamsPolicy::PerYear => {
                for &year in years {
                    let target = Target::Teams(year);
                    let result = self.refresh_target(target).await;
                    report.record(target.cache_key(), &result);
                    self.pause().await;
                }
            }
            TeamsPolicy::YearInvariant => {
                let (legacy, current): (Vec<u16>, Vec<u16>) = years
                    .iter()
                    .copied()
                    .partition(|&y| self.refresh.is_legacy_for_teams(y));

                for year in legacy {
                    self.mark_unavailable(year);
                }
                if current.is_empty() {
                    return report;
                }

                let result = self.refresh_shared_teams(&current).await;
                for year in current {
                    let key = Target::Teams(year).cache_key();
                    match &result {
                        Ok(()) => report.refreshed.push(key),
                        Err(e) => report.record(key, &Err(e.clone())),
                    }
                }
                self.pause().await;
            }
        }
        report
    }

    async fn refresh_per_year(&self, kind: DataKind, years: &[u16]) -> RefreshReport {
        let mut report = RefreshReport::default();
        for &year in years {
            let target = Target::new(kind, year);
            let result = self.refresh_target(target).await;
            report.record(target.cache_key(), &result);
            self.pause().await;
        }
        report
    }

    async fn refresh_news(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        let result = self.refresh_target(Target::News).await;
        report.record(Target::News.cache_key(), &result);
        report
    }

    async fn sweep(&self, years: &[u16], include_news: bool) -> RefreshReport {
        let mut report = self.refresh_teams(years).await;
        report.merge(self.refresh_per_year(DataKind::PointsTable, years).await);
        report.merge(self.refresh_per_year(DataKind::Matches, years).await);
        if include_news {
            report.merge(self.refresh_news().await);
        }
        report
    }

    /// Load every tracked season of every kind. A second call while one is
    /// running returns a skipped report immediately.
    pub async fn preload(&self) -> RefreshReport {
        if self
            .preloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("Preload already in progress, skipping");
            return RefreshReport::skipped();
        }
        let _guard = PreloadGuard(&self.preloading);

        let years = self.refresh.years();
        log::info!(
            "Starting data preload for {} seasons ({}-{})",
            years.len(),
            self.refresh.first_year,
            self.refresh.last_year
        );
        self.set_state(OrchestratorState::Preloading);

        let report = self.sweep(&years, true).await;

        if let Ok(mut last) = self.last_preload.lock() {
            *last = Some(Utc::now());
        }
        self.set_state(OrchestratorState::Ready);
        log::info!(
            "Preload finished: {} refreshed, {} failed",
            report.refreshed.len(),
            report.failed.len()
        );
        report
    }

    /// Whether `key` lacks an entry that is still within its TTL. Failed
    /// entries are always due so the next pass retries them.
    fn needs_refresh(&self, key: &str, now: i64) -> bool {
        match self.cache.peek(key) {
            Some(entry) => !entry.is_valid(now) || matches!(entry.data, CachedData::Failed(_)),
            None => true,
        }
    }

    /// The seasons in `always` plus every other tracked season whose entry
    /// for `kind` is due
    fn due_years(&self, kind: DataKind, always: &[u16]) -> Vec<u16> {
        let now = self.cache.now_ms();
        self.refresh
            .years()
            .into_iter()
            .filter(|y| always.contains(y) || self.needs_refresh(&kind.cache_key(Some(*y)), now))
            .collect()
    }

    /// Periodic pass: standings and results of the recent seasons, plus news.
    /// Older seasons are picked up only when their entry is missing, expired
    /// or failed.
    pub async fn refresh_recent(&self) -> RefreshReport {
        let recent = self.refresh.recent();
        log::info!("Refreshing recent seasons {:?}", recent);
        let previous = self.state();
        self.set_state(OrchestratorState::Refreshing);

        let mut report = RefreshReport::default();

        let team_years = match self.refresh.teams_policy {
            TeamsPolicy::PerYear => self.due_years(DataKind::Teams, &recent),
            TeamsPolicy::YearInvariant => self.due_years(DataKind::Teams, &[]),
        };
        if !team_years.is_empty() {
            report.merge(self.refresh_teams(&team_years).await);
        }

        for kind in [DataKind::PointsTable, DataKind::Matches] {
            let years = self.due_years(kind, &recent);
            if years.len() > recent.len() {
                log::info!("Backfilling {} for seasons {:?}", kind, years);
            }
            report.merge(self.refresh_per_year(kind, &years).await);
        }
        report.merge(self.refresh_news().await);

        self.restore_state(previous);
        report
    }

    /// Re-scrape one season (all kinds) or everything, regardless of TTL
    pub async fn force_refresh(&self, year: Option<u16>) -> RefreshReport {
        let previous = self.state();
        self.set_state(OrchestratorState::Refreshing);

        let report = match year {
            Some(year) => {
                log::info!("Force refreshing data for {}", year);
                self.sweep(&[year], false).await
            }
            None => {
                log::info!("Force refreshing all data");
                self.sweep(&self.refresh.years(), true).await
            }
        };

        self.restore_state(previous);
        report
    }

    /// Re-scrape a single key. Under the year-invariant teams policy this
    /// also updates the teams entries of the other current seasons.
    pub async fn force_refresh_kind(
        &self,
        kind: DataKind,
        year: u16,
    ) -> Result<Arc<CacheEntry>, ScrapeError> {
        let target = Target::new(kind, year);

        if kind == DataKind::Teams && self.refresh.teams_policy == TeamsPolicy::YearInvariant {
            if self.refresh.is_legacy_for_teams(year) {
                return Ok(self.mark_unavailable(year));
            }
            let current: Vec<u16> = self
                .refresh
                .years()
                .into_iter()
                .filter(|&y| !self.refresh.is_legacy_for_teams(y))
                .collect();
            self.refresh_shared_teams(&current).await?;
            return self
                .cache
                .peek(&target.cache_key())
                .ok_or_else(|| ScrapeError::UpstreamEmpty(target.cache_key()));
        }

        self.refresh_target(target).await
    }

    fn restore_state(&self, previous: OrchestratorState) {
        let next = if self.is_preloading() {
            OrchestratorState::Preloading
        } else {
            match previous {
                OrchestratorState::Idle => OrchestratorState::Idle,
                _ => OrchestratorState::Ready,
            }
        };
        self.set_state(next);
    }

    pub fn coverage(&self) -> CoverageReport {
        let now = self.cache.now_ms();
        let years = self.refresh.years();
        let is_loaded = |key: &str| {
            self.cache
                .peek(key)
                .is_some_and(|e| e.data.is_good() && e.is_valid(now))
        };

        let kinds = [DataKind::PointsTable, DataKind::Matches, DataKind::Teams]
            .into_iter()
            .map(|kind| {
                let loaded_years: Vec<u16> = years
                    .iter()
                    .copied()
                    .filter(|&y| is_loaded(&kind.cache_key(Some(y))))
                    .collect();
                KindCoverage {
                    kind,
                    loaded: loaded_years.len(),
                    total: years.len(),
                    loaded_years,
                }
            })
            .collect();

        CoverageReport {
            state: self.state(),
            recent_years: self.refresh.recent(),
            kinds,
            news_loaded: is_loaded(&DataKind::News.cache_key(None)),
            last_preload: self.last_preload.lock().ok().and_then(|l| *l),
            refresh_interval_minutes: self.refresh.interval_minutes,
            years,
        }
    }
}

fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let ms = if min_ms >= max_ms {
        max_ms
    } else {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    };
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_keys() {
        assert_eq!(Target::PointsTable(2025).cache_key(), "points-table-2025");
        assert_eq!(Target::new(DataKind::News, 2019).cache_key(), "news");
        assert_eq!(Target::Teams(2019).year(), Some(2019));
    }

    #[test]
    fn test_random_delay_bounds() {
        assert_eq!(random_delay(0, 0), Duration::ZERO);
        assert_eq!(random_delay(500, 500), Duration::from_millis(500));
        for _ in 0..20 {
            let d = random_delay(300, 800);
            assert!(d >= Duration::from_millis(300) && d <= Duration::from_millis(800));
        }
    }

    #[test]
    fn test_report_success() {
        let mut report = RefreshReport::default();
        report.record("news".into(), &Err(ScrapeError::Launch("x".into())));
        assert!(!report.is_success());
        assert_eq!(report.failed[0].category, "launch");
        assert!(!RefreshReport::skipped().is_success());
    }
}
