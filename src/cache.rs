//! TTL cache keyed by data kind and year.
//!
//! Entries are immutable and shared as `Arc<CacheEntry>`; `set` swaps the
//! pointer, so a reader either sees the old collection or the new one.
//! Expiry is lazy. `get` reports an expired entry as a miss; error-shaped
//! entries are dropped at that point, while collections stay in place as
//! the last good data until a newer `set` replaces them.
//! With a persistence directory every `set` is written through to
//! `<dir>/<key>.json`, and construction reloads whatever has not expired.

use crate::models::{MatchList, NewsFeed, PointsTable, ScrapeFailure, TeamsSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

const MINUTE_MS: i64 = 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache entry {path} is not valid JSON: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Millisecond wall clock, injectable so expiry can be tested
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.now.fetch_add(minutes * MINUTE_MS, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Payload stored under a cache key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum CachedData {
    PointsTable(PointsTable),
    Matches(MatchList),
    Teams(TeamsSnapshot),
    News(NewsFeed),
    /// Scrape failed and nothing good was cached yet
    Failed(ScrapeFailure),
    /// The site has no data of this kind for the key (e.g. legacy seasons)
    Unavailable { reason: String },
}

impl CachedData {
    /// True for real scraped data, false for error-shaped entries
    pub fn is_good(&self) -> bool {
        !matches!(self, CachedData::Failed(_) | CachedData::Unavailable { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub data: CachedData,
    /// Epoch milliseconds at insertion
    pub timestamp: i64,
    pub ttl_ms: i64,
}

impl CacheEntry {
    pub fn is_valid(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp < self.ttl_ms
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }

    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.ttl_ms - self.age_ms(now_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyStats {
    pub hits: u64,
    pub misses: u64,
    pub last_access: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cache_size: usize,
    pub total_hits: u64,
    pub total_misses: u64,
    /// Percentage of lookups that hit, 0 when nothing was looked up
    pub hit_rate: f64,
    pub entries: HashMap<String, KeyStats>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Hit,
    Expired,
    Miss,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub status: KeyState,
    /// Minutes left, rounded up; negative once expired
    pub remaining_ttl: i64,
    pub age: Option<i64>,
}

pub struct CacheStore {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    stats: Mutex<HashMap<String, KeyStats>>,
    persist_dir: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// In-memory store
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: Mutex::new(HashMap::new()),
            persist_dir: None,
            clock,
        }
    }

    /// Store backed by a directory of JSON files, reloading unexpired entries
    pub fn with_persistence(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut store = Self::new(clock);
        store.persist_dir = Some(dir);
        let loaded = store.load_from_disk()?;
        log::info!("Loaded {} cached entries from disk", loaded);
        Ok(store)
    }

    fn load_from_disk(&self) -> Result<usize, CacheError> {
        let Some(dir) = &self.persist_dir else {
            return Ok(0);
        };
        let now = self.clock.now_ms();
        let read_dir = fs::read_dir(dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut loaded = HashMap::new();
        for file in read_dir.flatten() {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_entry(&path) {
                Ok(entry) if entry.is_valid(now) => {
                    loaded.insert(entry.key.clone(), Arc::new(entry));
                }
                Ok(entry) => {
                    log::debug!("Removing expired cache file for {}", entry.key);
                    remove_file(&path);
                }
                Err(e) => log::warn!("Skipping unreadable cache file: {}", e),
            }
        }

        let count = loaded.len();
        if let Ok(mut entries) = self.entries.write() {
            entries.extend(loaded);
        }
        Ok(count)
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.persist_dir.as_ref().map(|dir| dir.join(file_name(key)))
    }

    fn record(&self, key: &str, hit: bool, now: i64) {
        if let Ok(mut stats) = self.stats.lock() {
            let stat = stats.entry(key.to_string()).or_default();
            if hit {
                stat.hits += 1;
            } else {
                stat.misses += 1;
            }
            stat.last_access = now;
        }
    }

    /// Valid entry for `key`. An expired entry counts as a miss and is
    /// evicted unless it holds good data.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let now = self.clock.now_ms();
        let current = self.peek(key);

        match current {
            Some(entry) if entry.is_valid(now) => {
                self.record(key, true, now);
                Some(entry)
            }
            Some(expired) if expired.data.is_good() => {
                self.record(key, false, now);
                None
            }
            Some(expired) => {
                // Only evict if nobody replaced it in the meantime
                if let Ok(mut entries) = self.entries.write() {
                    if entries.get(key).is_some_and(|e| Arc::ptr_eq(e, &expired)) {
                        entries.remove(key);
                        if let Some(path) = self.path_for(key) {
                            remove_file(&path);
                        }
                    }
                }
                self.record(key, false, now);
                None
            }
            None => {
                self.record(key, false, now);
                None
            }
        }
    }

    /// Entry for `key` whether or not it has expired, without touching stats
    pub fn peek(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Good data for `key`, expired or not
    pub fn last_good(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.peek(key).filter(|entry| entry.data.is_good())
    }

    /// Replace the entry for `key`, writing it through to disk when persistent
    pub fn set(&self, key: &str, data: CachedData, ttl_minutes: u64) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            key: key.to_string(),
            data,
            timestamp: self.clock.now_ms(),
            ttl_ms: ttl_minutes as i64 * MINUTE_MS,
        });

        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), entry.clone());
        }

        if let Some(path) = self.path_for(key) {
            if let Err(e) = write_entry(&path, &entry) {
                log::error!("Failed to save {} to disk: {}", key, e);
            }
        }

        log::debug!("Cached {} for {} minutes", key, ttl_minutes);
        entry
    }

    /// Drop one entry; returns whether it existed
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self
            .entries
            .write()
            .map(|mut entries| entries.remove(key).is_some())
            .unwrap_or(false);

        if let Some(path) = self.path_for(key) {
            remove_file(&path);
        }
        log::info!("Invalidated cache for {}", key);
        removed
    }

    /// Drop every entry, its file and all stats
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.clear();
        }
        if let Some(dir) = &self.persist_dir {
            if let Ok(read_dir) = fs::read_dir(dir) {
                for file in read_dir.flatten() {
                    let path = file.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("json") {
                        remove_file(&path);
                    }
                }
            }
        }
        log::info!("Cleared all cache");
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default();
        let total_hits: u64 = entries.values().map(|s| s.hits).sum();
        let total_misses: u64 = entries.values().map(|s| s.misses).sum();
        let lookups = total_hits + total_misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            ((total_hits as f64 / lookups as f64) * 1000.0).round() / 10.0
        };

        CacheStats {
            cache_size: self.len(),
            total_hits,
            total_misses,
            hit_rate,
            entries,
        }
    }

    /// Diagnostics for one key; does not count as a lookup
    pub fn status(&self, key: &str) -> KeyStatus {
        let now = self.clock.now_ms();
        match self.peek(key) {
            None => KeyStatus {
                status: KeyState::Miss,
                remaining_ttl: 0,
                age: None,
            },
            Some(entry) => {
                let remaining = entry.remaining_ms(now);
                KeyStatus {
                    status: if remaining > 0 {
                        KeyState::Hit
                    } else {
                        KeyState::Expired
                    },
                    remaining_ttl: ceil_div(remaining, MINUTE_MS),
                    age: Some(entry.age_ms(now).div_euclid(MINUTE_MS)),
                }
            }
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    -((-value).div_euclid(divisor))
}

fn file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.json", safe)
}

fn read_entry(path: &Path) -> Result<CacheEntry, CacheError> {
    let content = fs::read_to_string(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CacheError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

fn write_entry(path: &Path, entry: &CacheEntry) -> Result<(), CacheError> {
    let json = serde_json::to_string_pretty(entry).map_err(|source| CacheError::Serde {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable(reason: &str) -> CachedData {
        CachedData::Unavailable {
            reason: reason.to_string(),
        }
    }

    fn sample_table(year: u16) -> PointsTable {
        PointsTable {
            year,
            teams: Vec::new(),
            total_teams: 0,
            last_updated: chrono::Utc::now(),
            table_structure: Default::default(),
        }
    }

    fn store_at(start: i64) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (CacheStore::new(clock.clone()), clock)
    }

    #[test]
    fn test_get_respects_ttl() {
        let (store, clock) = store_at(1_000_000);
        store.set("teams-2019", unavailable("legacy"), 10);

        clock.advance_minutes(9);
        assert!(store.get("teams-2019").is_some());

        clock.advance_minutes(1);
        assert!(store.get("teams-2019").is_none());
        // Evicted lazily, so it is gone for peek too
        assert!(store.peek("teams-2019").is_none());

        let stats = store.stats();
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
        assert_eq!(stats.cache_size, 0);
    }

    #[test]
    fn test_expired_collection_kept_as_last_good() {
        let (store, clock) = store_at(1_000_000);
        store.set("points-table-2019", CachedData::PointsTable(sample_table(2019)), 60);

        clock.advance_minutes(61);
        assert!(store.get("points-table-2019").is_none());
        assert!(store.get("points-table-2019").is_none());

        let stale = store.last_good("points-table-2019").unwrap();
        assert!(!stale.is_valid(store.now_ms()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().total_misses, 2);
    }

    #[test]
    fn test_last_good_ignores_failures() {
        let (store, _clock) = store_at(1_000_000);
        store.set("matches-2019", unavailable("legacy"), 10);
        assert!(store.peek("matches-2019").is_some());
        assert!(store.last_good("matches-2019").is_none());
    }

    #[test]
    fn test_status_reports_remaining_and_age() {
        let (store, clock) = store_at(0);
        assert_eq!(store.status("news").status, KeyState::Miss);

        store.set("news", unavailable("x"), 60);
        clock.advance_minutes(15);
        clock.set(clock.now_ms() + 30_000);
        let status = store.status("news");
        assert_eq!(status.status, KeyState::Hit);
        assert_eq!(status.remaining_ttl, 45);
        assert_eq!(status.age, Some(15));

        clock.advance_minutes(60);
        assert_eq!(store.status("news").status, KeyState::Expired);
        // status is diagnostics only
        assert_eq!(store.stats().total_misses, 0);
    }

    #[test]
    fn test_set_replaces_atomically() {
        let (store, _) = store_at(0);
        let old = store.set("matches-2024", unavailable("first"), 10);
        let reader_view = store.get("matches-2024").unwrap();
        store.set("matches-2024", unavailable("second"), 10);

        assert_eq!(reader_view.data, old.data);
        assert_eq!(
            store.get("matches-2024").unwrap().data,
            unavailable("second")
        );
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (store, _) = store_at(0);
        store.set("a", unavailable("x"), 10);
        store.set("b", unavailable("x"), 10);
        assert!(store.invalidate("a"));
        assert!(!store.invalidate("a"));
        assert_eq!(store.keys(), vec!["b".to_string()]);

        store.get("b");
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats().total_hits, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(5_000));

        {
            let store = CacheStore::with_persistence(dir.path(), clock.clone()).unwrap();
            store.set("points-table-2025", unavailable("pending"), 60);
            store.set("news", unavailable("short"), 1);
        }
        assert!(dir.path().join("points-table-2025.json").exists());

        clock.advance_minutes(5);
        let reloaded = CacheStore::with_persistence(dir.path(), clock.clone()).unwrap();
        assert_eq!(reloaded.keys(), vec!["points-table-2025".to_string()]);
        assert!(!dir.path().join("news.json").exists());

        let entry = reloaded.get("points-table-2025").unwrap();
        assert_eq!(entry.timestamp, 5_000);
        assert_eq!(entry.data, unavailable("pending"));

        reloaded.clear();
        assert!(!dir.path().join("points-table-2025.json").exists());
    }

    #[test]
    fn test_corrupt_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = CacheStore::with_persistence(dir.path(), Arc::new(SystemClock)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_error_shaped_entries_are_not_good() {
        assert!(!unavailable("legacy").is_good());
        let failed = CachedData::Failed(ScrapeFailure {
            category: "launch".into(),
            message: "no chrome".into(),
            failed_at: chrono::Utc::now(),
        });
        assert!(!failed.is_good());
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["kind"], "failed");
    }

    #[test]
    fn test_file_names_are_sanitized() {
        assert_eq!(file_name("teams-2019"), "teams-2019.json");
        assert_eq!(file_name("../etc"), "___etc.json");
    }
}
