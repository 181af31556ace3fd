use crate::browser::BrowserConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "IPL_SCRAPER_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// First port tried when binding
    #[serde(default = "default_port_start")]
    pub port_start: u16,

    /// Last port tried before giving up
    #[serde(default = "default_port_end")]
    pub port_end: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// How team listings relate to seasons
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TeamsPolicy {
    /// The teams page is not season-specific: scrape once and share the
    /// result across years, marking legacy seasons unavailable
    #[default]
    YearInvariant,
    /// Scrape the teams page separately for every year
    PerYear,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_first_year")]
    pub first_year: u16,

    #[serde(default = "default_last_year")]
    pub last_year: u16,

    /// Number of most recent seasons re-scraped by the periodic refresh
    #[serde(default = "default_recent_years")]
    pub recent_years: u16,

    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Randomized pause between consecutive scrapes
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,

    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,

    #[serde(default)]
    pub teams_policy: TeamsPolicy,

    /// Seasons before this have no franchise data on the current teams page
    #[serde(default = "default_teams_legacy_before")]
    pub teams_legacy_before: u16,

    #[serde(default = "default_true")]
    pub preload_on_start: bool,

    #[serde(default = "default_news_limit")]
    pub news_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Write entries through to `dir` and reload them on start
    #[serde(default = "default_true")]
    pub persist: bool,

    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_ttl_recent")]
    pub ttl_recent_minutes: u64,

    #[serde(default = "default_ttl_historical")]
    pub ttl_historical_minutes: u64,

    #[serde(default = "default_ttl_news")]
    pub ttl_news_minutes: u64,

    /// Lifetime of error-shaped entries, after which a read is a plain miss
    #[serde(default = "default_ttl_error")]
    pub ttl_error_minutes: u64,
}

fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port_start() -> u16 {
    8080
}
fn default_port_end() -> u16 {
    8090
}
fn default_base_url() -> String {
    "https://www.iplt20.com".to_string()
}
fn default_first_year() -> u16 {
    2008
}
fn default_last_year() -> u16 {
    2025
}
fn default_recent_years() -> u16 {
    3
}
fn default_interval_minutes() -> u64 {
    30
}
fn default_delay_min_ms() -> u64 {
    300
}
fn default_delay_max_ms() -> u64 {
    800
}
fn default_teams_legacy_before() -> u16 {
    2022
}
fn default_news_limit() -> usize {
    20
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}
fn default_ttl_recent() -> u64 {
    60
}
fn default_ttl_historical() -> u64 {
    7 * 24 * 60
}
fn default_ttl_news() -> u64 {
    30
}
fn default_ttl_error() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port_start: default_port_start(),
            port_end: default_port_end(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            first_year: default_first_year(),
            last_year: default_last_year(),
            recent_years: default_recent_years(),
            interval_minutes: default_interval_minutes(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            teams_policy: TeamsPolicy::default(),
            teams_legacy_before: default_teams_legacy_before(),
            preload_on_start: true,
            news_limit: default_news_limit(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persist: true,
            dir: default_cache_dir(),
            ttl_recent_minutes: default_ttl_recent(),
            ttl_historical_minutes: default_ttl_historical(),
            ttl_news_minutes: default_ttl_news(),
            ttl_error_minutes: default_ttl_error(),
        }
    }
}

impl RefreshConfig {
    /// Every tracked season, oldest first
    pub fn years(&self) -> Vec<u16> {
        (self.first_year..=self.last_year).collect()
    }

    pub fn is_tracked(&self, year: u16) -> bool {
        (self.first_year..=self.last_year).contains(&year)
    }

    /// The seasons the periodic refresh revisits, oldest first
    pub fn recent(&self) -> Vec<u16> {
        let span = self.recent_years.max(1) - 1;
        let start = self.last_year.saturating_sub(span).max(self.first_year);
        (start..=self.last_year).collect()
    }

    pub fn is_recent(&self, year: u16) -> bool {
        self.recent().contains(&year)
    }

    pub fn is_legacy_for_teams(&self, year: u16) -> bool {
        year < self.teams_legacy_before
    }
}

impl Config {
    /// Load from `$IPL_SCRAPER_CONFIG` or `config.toml`, falling back to defaults
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));

        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.refresh;
        if r.first_year > r.last_year {
            return Err(ConfigError::Invalid(format!(
                "first_year {} is after last_year {}",
                r.first_year, r.last_year
            )));
        }
        if r.delay_min_ms > r.delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "delay_min_ms {} exceeds delay_max_ms {}",
                r.delay_min_ms, r.delay_max_ms
            )));
        }
        if self.server.port_start > self.server.port_end {
            return Err(ConfigError::Invalid(format!(
                "port range {}..={} is empty",
                self.server.port_start, self.server.port_end
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.refresh.years().len(), 18);
        assert_eq!(cfg.refresh.recent(), vec![2023, 2024, 2025]);
        assert_eq!(cfg.refresh.interval_minutes, 30);
        assert_eq!(cfg.refresh.teams_policy, TeamsPolicy::YearInvariant);
        assert_eq!(cfg.cache.ttl_recent_minutes, 60);
        assert_eq!(cfg.browser.navigation_timeout_secs, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [refresh]
            recent_years = 2
            teams_policy = "per-year"

            [browser]
            headless = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.refresh.recent(), vec![2024, 2025]);
        assert_eq!(cfg.refresh.teams_policy, TeamsPolicy::PerYear);
        assert_eq!(cfg.refresh.first_year, 2008);
        assert!(!cfg.browser.headless);
        assert_eq!(cfg.site.base_url, "https://www.iplt20.com");
    }

    #[test]
    fn test_recent_clamped_to_range() {
        let refresh = RefreshConfig {
            first_year: 2024,
            last_year: 2025,
            recent_years: 5,
            ..RefreshConfig::default()
        };
        assert_eq!(refresh.recent(), vec![2024, 2025]);
        assert!(refresh.is_tracked(2024));
        assert!(!refresh.is_tracked(2023));
    }

    #[test]
    fn test_load_from_file_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "[server]\nport_start = 9000\nport_end = 9001\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.server.port_start, 9000);

        fs::write(&path, "[refresh]\nfirst_year = 2030\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        fs::write(&path, "[refresh\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
