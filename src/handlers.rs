//! HTTP handlers. Everything here reads from the cache; only `refresh=true`
//! and `/refresh` trigger scrapes.

use crate::app_state::AppState;
use crate::cache::{CacheEntry, CachedData, KeyStatus};
use crate::models::{DataKind, MatchRecord, NewsFeed, PointsTable, TeamsSnapshot};
use crate::schedule::build_schedule;
use actix_web::http::{header, StatusCode};
use actix_web::{get, web, HttpResponse, Responder, ResponseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Seconds a client should wait when nothing is cached yet
const LOADING_RETRY_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Unavailable { message: String, retry_after: u64 },

    #[error("{0}")]
    NotAvailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn label(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Bad Request",
            ApiError::Unavailable { .. } => "Service Unavailable",
            ApiError::NotAvailable(_) => "Not Available",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotAvailable(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({
            "error": self.label(),
            "message": self.to_string(),
            "timestamp": Utc::now(),
        });

        let mut response = HttpResponse::build(self.status_code());
        if let ApiError::Unavailable { retry_after, .. } = self {
            body["retryAfter"] = serde_json::json!(retry_after);
            response.insert_header((header::RETRY_AFTER, retry_after.to_string()));
        }
        response.json(body)
    }
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<u16>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    pub year: Option<u16>,
}

/// A cached collection plus whether it came from the cache
#[derive(Debug, Serialize)]
pub struct Served<T> {
    #[serde(flatten)]
    pub data: T,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchesResponse {
    pub year: u16,
    pub total_matches: usize,
    pub matches: Vec<MatchRecord>,
    pub last_updated: DateTime<Utc>,
    pub cached: bool,
}

fn resolve_year(data: &AppState, year: Option<u16>) -> Result<u16, ApiError> {
    let refresh = &data.config.refresh;
    let year = year.unwrap_or(refresh.last_year);
    if refresh.is_tracked(year) {
        Ok(year)
    } else {
        Err(ApiError::BadRequest(format!(
            "Year must be between {} and {}",
            refresh.first_year, refresh.last_year
        )))
    }
}

/// Cached entry for a key, force-refreshing first when asked.
///
/// A failed forced refresh falls back to whatever good data is cached, and
/// an expired collection is still served until a scrape replaces it.
async fn load(
    data: &AppState,
    kind: DataKind,
    year: u16,
    refresh: bool,
) -> Result<(Arc<CacheEntry>, bool), ApiError> {
    let key = kind.cache_key(if kind == DataKind::News { None } else { Some(year) });

    if refresh {
        match data.orchestrator.force_refresh_kind(kind, year).await {
            Ok(entry) if entry.data.is_good() => return Ok((entry, false)),
            Ok(_) => {}
            Err(e) => log::warn!("Forced refresh of {} failed: {}", key, e),
        }
    }

    match data.cache.get(&key) {
        Some(entry) => match &entry.data {
            CachedData::Failed(failure) => {
                let retry_after = (entry.remaining_ms(data.cache.now_ms()) / 1000).max(1) as u64;
                Err(ApiError::Unavailable {
                    message: format!("Failed to load {}: {}", key, failure.message),
                    retry_after,
                })
            }
            CachedData::Unavailable { reason } => Err(ApiError::NotAvailable(reason.clone())),
            _ => Ok((entry.clone(), true)),
        },
        None => match data.cache.last_good(&key) {
            Some(stale) => {
                log::debug!("Serving expired {} until the next refresh", key);
                Ok((stale, true))
            }
            None => Err(ApiError::Unavailable {
                message: format!("Data for {} is still loading", key),
                retry_after: LOADING_RETRY_SECS,
            }),
        },
    }
}

fn wrong_kind(key: &str) -> ApiError {
    ApiError::Internal(format!("Cache entry {} holds an unexpected data kind", key))
}

#[get("/points-table")]
async fn points_table(
    data: web::Data<AppState>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, ApiError> {
    let year = resolve_year(&data, query.year)?;
    let (entry, cached) = load(&data, DataKind::PointsTable, year, query.refresh).await?;
    match &entry.data {
        CachedData::PointsTable(table) => Ok(HttpResponse::Ok().json(Served::<&PointsTable> {
            data: table,
            cached,
        })),
        _ => Err(wrong_kind(&entry.key)),
    }
}

#[get("/matches")]
async fn matches(
    data: web::Data<AppState>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, ApiError> {
    let year = resolve_year(&data, query.year)?;
    let (entry, cached) = load(&data, DataKind::Matches, year, query.refresh).await?;
    match &entry.data {
        CachedData::Matches(list) => Ok(HttpResponse::Ok().json(MatchesResponse {
            year: list.year,
            total_matches: list.matches.len(),
            matches: list.matches.clone(),
            last_updated: list.last_updated,
            cached,
        })),
        _ => Err(wrong_kind(&entry.key)),
    }
}

#[get("/schedule")]
async fn schedule(
    data: web::Data<AppState>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, ApiError> {
    let year = resolve_year(&data, query.year)?;
    let (entry, cached) = load(&data, DataKind::Matches, year, query.refresh).await?;
    match &entry.data {
        CachedData::Matches(list) => Ok(HttpResponse::Ok().json(Served {
            data: build_schedule(list),
            cached,
        })),
        _ => Err(wrong_kind(&entry.key)),
    }
}

#[get("/teams")]
async fn teams(
    data: web::Data<AppState>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, ApiError> {
    let year = resolve_year(&data, query.year)?;
    let (entry, cached) = load(&data, DataKind::Teams, year, query.refresh).await?;
    match &entry.data {
        CachedData::Teams(snapshot) => Ok(HttpResponse::Ok().json(Served::<&TeamsSnapshot> {
            data: snapshot,
            cached,
        })),
        _ => Err(wrong_kind(&entry.key)),
    }
}

#[get("/news")]
async fn news(
    data: web::Data<AppState>,
    query: web::Query<NewsQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(data.config.refresh.news_limit).max(1);
    let (entry, cached) = load(&data, DataKind::News, data.config.refresh.last_year, query.refresh).await?;
    match &entry.data {
        CachedData::News(feed) => {
            let articles: Vec<_> = feed.articles.iter().take(limit).cloned().collect();
            Ok(HttpResponse::Ok().json(Served {
                data: NewsFeed {
                    total_articles: articles.len(),
                    articles,
                    last_updated: feed.last_updated,
                    source: feed.source.clone(),
                },
                cached,
            }))
        }
        _ => Err(wrong_kind(&entry.key)),
    }
}

#[get("/refresh")]
async fn refresh_data(
    data: web::Data<AppState>,
    query: web::Query<RefreshQuery>,
) -> Result<HttpResponse, ApiError> {
    match query.year {
        Some(year) => {
            let year = resolve_year(&data, Some(year))?;
            let report = data.orchestrator.force_refresh(Some(year)).await;
            let message = if report.is_success() {
                format!("Data refreshed for {}", year)
            } else {
                format!(
                    "Refresh for {} finished with {} failures",
                    year,
                    report.failed.len()
                )
            };
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": report.is_success(),
                "message": message,
                "year": year,
                "refreshed": report.refreshed,
                "failed": report.failed,
            })))
        }
        None => {
            let orchestrator = data.orchestrator.clone();
            actix_web::rt::spawn(async move {
                let report = orchestrator.force_refresh(None).await;
                log::info!(
                    "Full refresh done: {} refreshed, {} failed",
                    report.refreshed.len(),
                    report.failed.len()
                );
            });
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "Full refresh started for all seasons",
            })))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyReport {
    key: String,
    #[serde(flatten)]
    status: KeyStatus,
    kind: &'static str,
}

#[get("/cache-status")]
async fn cache_status(data: web::Data<AppState>) -> impl Responder {
    let keys: Vec<KeyReport> = data
        .cache
        .keys()
        .into_iter()
        .map(|key| {
            let kind = match data.cache.peek(&key).map(|e| e.data.clone()) {
                Some(CachedData::Failed(_)) => "failed",
                Some(CachedData::Unavailable { .. }) => "unavailable",
                Some(_) => "data",
                None => "missing",
            };
            KeyReport {
                status: data.cache.status(&key),
                key,
                kind,
            }
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "stats": data.cache.stats(),
        "keys": keys,
        "coverage": data.orchestrator.coverage(),
        "metrics": data.metrics.get_all_metrics(),
        "timestamp": Utc::now(),
    }))
}

#[get("/metrics")]
async fn metrics(data: web::Data<AppState>) -> impl Responder {
    let all_metrics = data.metrics.get_all_metrics();

    let metrics_json: Vec<serde_json::Value> = all_metrics
        .iter()
        .map(|m| {
            serde_json::json!({
                "kind": m.kind,
                "successRate": format!("{:.2}%", m.success_rate()),
                "totalScrapes": m.total_scrapes,
                "successfulScrapes": m.successful_scrapes,
                "failedScrapes": m.failed_scrapes,
                "averageDurationMs": format!("{:.2}", m.average_duration_ms),
                "timeoutCount": m.timeout_count,
                "failuresByCategory": m.failures_by_category,
                "lastSuccess": m.last_success,
                "lastFailure": m.last_failure,
                "lastError": m.last_error,
            })
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "metrics": metrics_json,
        "timestamp": Utc::now(),
    }))
}

#[get("/health")]
async fn health(data: web::Data<AppState>) -> impl Responder {
    let stats = data.cache.stats();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "ipl-scraper",
        "timestamp": Utc::now(),
        "uptimeSeconds": (Utc::now() - data.started_at).num_seconds(),
        "state": data.orchestrator.state(),
        "cache": {
            "size": stats.cache_size,
            "hitRate": stats.hit_rate,
        },
    }))
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "service": "ipl-scraper",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /points-table?year=YYYY&refresh=bool",
            "GET /matches?year=YYYY&refresh=bool",
            "GET /schedule?year=YYYY&refresh=bool",
            "GET /teams?year=YYYY&refresh=bool",
            "GET /news?limit=N&refresh=bool",
            "GET /refresh?year=YYYY",
            "GET /cache-status",
            "GET /metrics",
            "GET /health",
        ],
    }))
}

/// Register every route on an `App`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(health)
        .service(points_table)
        .service(matches)
        .service(schedule)
        .service(teams)
        .service(news)
        .service(refresh_data)
        .service(cache_status)
        .service(metrics);
}
