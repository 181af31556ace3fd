//! Scrape metrics per data kind
//!
//! Tracks success rates, failure categories and durations for every kind
//! of scrape, exposed through `/metrics` and `/cache-status`.

use crate::error::ScrapeError;
use crate::models::DataKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeMetrics {
    pub kind: DataKind,
    pub total_scrapes: u64,
    pub successful_scrapes: u64,
    pub failed_scrapes: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_duration_ms: f64,
    pub total_duration_ms: u64,
    pub timeout_count: u64,
    /// Failure count by error category
    pub failures_by_category: BTreeMap<String, u64>,
}

impl ScrapeMetrics {
    pub fn new(kind: DataKind) -> Self {
        Self {
            kind,
            total_scrapes: 0,
            successful_scrapes: 0,
            failed_scrapes: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            average_duration_ms: 0.0,
            total_duration_ms: 0,
            timeout_count: 0,
            failures_by_category: BTreeMap::new(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_scrapes == 0 {
            0.0
        } else {
            (self.successful_scrapes as f64 / self.total_scrapes as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, duration: Duration) {
        self.total_scrapes += 1;
        self.successful_scrapes += 1;
        self.last_success = Some(Utc::now());

        self.total_duration_ms += duration.as_millis() as u64;
        self.average_duration_ms = self.total_duration_ms as f64 / self.successful_scrapes as f64;
    }

    pub fn record_failure(&mut self, error: &ScrapeError) {
        self.total_scrapes += 1;
        self.failed_scrapes += 1;
        self.last_failure = Some(Utc::now());
        self.last_error = Some(error.to_string());

        if error.is_timeout() {
            self.timeout_count += 1;
        }
        *self
            .failures_by_category
            .entry(error.category().to_string())
            .or_insert(0) += 1;
    }
}

pub struct MetricsTracker {
    metrics: Mutex<HashMap<DataKind, ScrapeMetrics>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DataKind, ScrapeMetrics>> {
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_success(&self, kind: DataKind, duration: Duration) {
        let mut metrics = self.lock();
        let m = metrics.entry(kind).or_insert_with(|| ScrapeMetrics::new(kind));
        m.record_success(duration);

        log::info!(
            "[{}] Success - Duration: {}ms - Success rate: {:.2}%",
            kind,
            duration.as_millis(),
            m.success_rate()
        );
    }

    pub fn record_failure(&self, kind: DataKind, error: &ScrapeError) {
        let mut metrics = self.lock();
        let m = metrics.entry(kind).or_insert_with(|| ScrapeMetrics::new(kind));
        m.record_failure(error);

        log::warn!(
            "[{}] Failure - Error: {} - Success rate: {:.2}%",
            kind,
            error,
            m.success_rate()
        );
    }

    pub fn get_metrics(&self, kind: DataKind) -> Option<ScrapeMetrics> {
        self.lock().get(&kind).cloned()
    }

    /// All tracked kinds in a stable order
    pub fn get_all_metrics(&self) -> Vec<ScrapeMetrics> {
        let metrics = self.lock();
        DataKind::ALL
            .iter()
            .filter_map(|kind| metrics.get(kind).cloned())
            .collect()
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Time a blocking scrape and record its outcome
pub fn track_scrape<T>(
    tracker: &MetricsTracker,
    kind: DataKind,
    operation: impl FnOnce() -> Result<T, ScrapeError>,
) -> Result<T, ScrapeError> {
    let start = Instant::now();
    let result = operation();

    match &result {
        Ok(_) => tracker.record_success(kind, start.elapsed()),
        Err(e) => tracker.record_failure(kind, e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ScrapeMetrics::new(DataKind::News);
        assert_eq!(metrics.total_scrapes, 0);
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn test_record_failure_categorizes() {
        let mut metrics = ScrapeMetrics::new(DataKind::PointsTable);
        metrics.record_failure(&ScrapeError::ExtractionTimeout {
            selector: "table".into(),
            timeout_secs: 10,
        });
        metrics.record_failure(&ScrapeError::Structural("no TEAM".into()));

        assert_eq!(metrics.failed_scrapes, 2);
        assert_eq!(metrics.timeout_count, 1);
        assert_eq!(metrics.failures_by_category["structural"], 1);
        assert!(metrics.last_error.unwrap().contains("no TEAM"));
    }

    #[test]
    fn test_success_rate_calculation() {
        let mut metrics = ScrapeMetrics::new(DataKind::Matches);
        metrics.record_success(Duration::from_millis(100));
        metrics.record_success(Duration::from_millis(300));
        metrics.record_failure(&ScrapeError::Launch("no chrome".into()));

        assert_eq!(metrics.total_scrapes, 3);
        assert!((metrics.success_rate() - 66.66).abs() < 0.1);
        assert_eq!(metrics.average_duration_ms, 200.0);
    }

    #[test]
    fn test_track_scrape() {
        let tracker = MetricsTracker::new();
        let ok: Result<u32, ScrapeError> = track_scrape(&tracker, DataKind::Teams, || Ok(10));
        assert_eq!(ok.unwrap(), 10);
        let _ = track_scrape::<()>(&tracker, DataKind::News, || {
            Err(ScrapeError::UpstreamEmpty("news".into()))
        });

        assert_eq!(tracker.get_metrics(DataKind::Teams).unwrap().success_rate(), 100.0);
        assert_eq!(tracker.get_metrics(DataKind::News).unwrap().failed_scrapes, 1);
        let all = tracker.get_all_metrics();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, DataKind::Teams);
    }
}
