use super::config::BrowserConfig;
use super::identity::IdentityProvider;
use super::page::BrowserPage;
use crate::error::ScrapeError;
use headless_chrome::{Browser, LaunchOptions};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

/// Launches browser sessions and configures pages with a fresh fingerprint
pub struct BrowserManager {
    config: BrowserConfig,
    identities: Arc<dyn IdentityProvider>,
}

/// A running browser process. Dropping the session kills the process, so
/// it is released on every exit path.
pub struct Session {
    browser: Option<Browser>,
}

impl BrowserManager {
    pub fn new(config: BrowserConfig, identities: Arc<dyn IdentityProvider>) -> Self {
        Self { config, identities }
    }

    /// Build Chrome launch options from our config
    fn build_launch_options<'a>(
        config: &BrowserConfig,
        args: &'a [String],
    ) -> Result<LaunchOptions<'a>, ScrapeError> {
        LaunchOptions::default_builder()
            .headless(config.headless)
            .path(config.chrome_path.clone())
            .args(args.iter().map(OsStr::new).collect())
            .idle_browser_timeout(Duration::from_secs(
                config.navigation_timeout_secs + config.wait_timeout_secs + 60,
            ))
            .build()
            .map_err(|e| ScrapeError::Launch(format!("invalid launch options: {}", e)))
    }

    /// Start a new headless browser process
    pub fn create_session(&self) -> Result<Session, ScrapeError> {
        let args = self.config.launch_args();
        let options = Self::build_launch_options(&self.config, &args)?;

        let browser = Browser::new(options).map_err(|e| ScrapeError::Launch(e.to_string()))?;
        log::debug!("Browser session started");

        Ok(Session {
            browser: Some(browser),
        })
    }

    /// Open a tab with a randomized user agent, viewport and headers
    pub fn create_page(&self, session: &Session) -> Result<BrowserPage, ScrapeError> {
        let browser = session
            .browser
            .as_ref()
            .ok_or_else(|| ScrapeError::Launch("session is closed".to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::Browser(format!("Tab creation failed: {}", e)))?;
        tab.set_default_timeout(self.config.navigation_timeout());

        let identity = self.identities.next_identity();
        log::debug!(
            "Using user agent: {}...",
            identity.user_agent.split(' ').next().unwrap_or_default()
        );

        tab.set_user_agent(
            &identity.user_agent,
            Some(&identity.accept_language),
            None,
        )
        .map_err(|e| ScrapeError::Browser(format!("Setting user agent failed: {}", e)))?;

        let headers = identity.headers();
        let header_map: HashMap<&str, &str> = headers
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        tab.set_extra_http_headers(header_map)
            .map_err(|e| ScrapeError::Browser(format!("Setting headers failed: {}", e)))?;

        let (width, height) = identity.viewport;
        tab.set_bounds(headless_chrome::types::Bounds::Normal {
            left: Some(0),
            top: Some(0),
            width: Some(width as f64),
            height: Some(height as f64),
        })
        .map_err(|e| ScrapeError::Browser(format!("Setting viewport failed: {}", e)))?;

        Ok(BrowserPage::new(tab, self.config.clone()))
    }

    /// Release the browser process. Equivalent to dropping the session.
    pub fn close_session(&self, session: Session) {
        drop(session);
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    /// Kill the browser process. Calling this more than once is harmless.
    pub fn close(&mut self) {
        if self.browser.take().is_some() {
            log::debug!("Browser session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::identity::FixedIdentity;
    use crate::browser::page::PageDriver;

    #[test]
    fn test_launch_options_build() {
        let config = BrowserConfig::default();
        let args = config.launch_args();
        let options = BrowserManager::build_launch_options(&config, &args).unwrap();

        assert!(options
            .args
            .iter()
            .any(|arg| arg.to_string_lossy().contains("AutomationControlled")));
    }

    #[test]
    fn test_closed_session_rejects_pages() {
        let manager = BrowserManager::new(BrowserConfig::default(), Arc::new(FixedIdentity::default()));
        let mut session = Session { browser: None };
        session.close();
        assert!(!session.is_open());
        assert!(matches!(
            manager.create_page(&session),
            Err(ScrapeError::Launch(_))
        ));
    }

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn test_session_lifecycle() {
        let manager = BrowserManager::new(BrowserConfig::default(), Arc::new(FixedIdentity::default()));
        let session = manager.create_session().unwrap();
        let page = manager.create_page(&session).unwrap();
        page.navigate("https://example.com").unwrap();
        assert!(page.html().unwrap().contains("Example Domain"));
        manager.close_session(session);
    }
}
