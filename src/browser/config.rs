use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for browser sessions
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when unset
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Navigation timeout in seconds
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// How long to wait for target content (e.g. the standings table)
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Pause after navigation so client-side rendering can finish
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Disable image loading for performance
    #[serde(default = "default_true")]
    pub disable_images: bool,

    /// Additional Chrome flags
    #[serde(default)]
    pub chrome_flags: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_navigation_timeout() -> u64 {
    10
}
fn default_wait_timeout() -> u64 {
    10
}
fn default_settle_ms() -> u64 {
    3000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            navigation_timeout_secs: default_navigation_timeout(),
            wait_timeout_secs: default_wait_timeout(),
            settle_ms: default_settle_ms(),
            disable_images: true,
            chrome_flags: vec![],
        }
    }
}

impl BrowserConfig {
    /// Create a configuration for debugging (non-headless, visible browser)
    pub fn debug_mode() -> Self {
        Self {
            headless: false,
            disable_images: false,
            ..Self::default()
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Chrome arguments: the anti-automation flags plus any configured extras
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--disable-web-security",
            "--disable-blink-features=AutomationControlled",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if self.disable_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }
        args.extend(self.chrome_flags.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.navigation_timeout(), Duration::from_secs(10));
        assert_eq!(config.wait_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_launch_args_include_stealth_flags() {
        let config = BrowserConfig {
            chrome_flags: vec!["--lang=en-US".to_string()],
            ..BrowserConfig::default()
        };
        let args = config.launch_args();
        assert!(args.iter().any(|f| f.contains("AutomationControlled")));
        assert!(args.iter().any(|f| f.contains("imagesEnabled=false")));
        assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));
    }

    #[test]
    fn test_debug_mode() {
        let config = BrowserConfig::debug_mode();
        assert!(!config.headless);
        assert!(!config.disable_images);
        assert!(!config.launch_args().iter().any(|f| f.contains("imagesEnabled")));
    }
}
