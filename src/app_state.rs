//! Application state for the Actix-web server
//!
//! `AppState` is wrapped in `web::Data` and shared by every handler and the
//! background scheduler. Handlers read through `cache`; only explicit
//! refresh requests go through `orchestrator`.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::metrics::MetricsTracker;
use crate::orchestrator::Orchestrator;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct AppState {
    /// Shared TTL cache, also owned by the orchestrator
    pub cache: Arc<CacheStore>,
    /// Drives scrapes and refresh passes
    pub orchestrator: Arc<Orchestrator>,
    /// Per-kind scrape metrics
    pub metrics: Arc<MetricsTracker>,
    /// Application configuration
    pub config: Config,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Config) -> Self {
        Self {
            cache: orchestrator.cache().clone(),
            metrics: orchestrator.metrics().clone(),
            orchestrator,
            config,
            started_at: Utc::now(),
        }
    }
}
