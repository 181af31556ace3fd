use super::config::BrowserConfig;
use crate::error::ScrapeError;
use headless_chrome::Tab;
use scraper::{Html, Selector};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Hides the usual automation giveaways from the page's scripts
const STEALTH_SCRIPT: &str = r#"
    try { delete Object.getPrototypeOf(navigator).webdriver; } catch (e) {}
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    window.chrome = window.chrome || { runtime: {} };
"#;

/// The page operations extractors rely on.
///
/// Implemented by [`BrowserPage`] for live scraping and by [`StaticPage`]
/// for recorded HTML snapshots.
pub trait PageDriver {
    /// Navigate to a URL and wait for the navigation to finish
    fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    /// Wait until an element matching `selector` exists
    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Give client-side rendering time to settle
    fn settle(&self, duration: Duration);

    /// Serialized DOM of the current page
    fn html(&self) -> Result<String, ScrapeError>;

    /// Rendered text of the page body, one visual line per line
    fn visible_text(&self) -> Result<String, ScrapeError>;

    /// Run a script that returns a JSON string and parse the result
    fn evaluate_json(&self, script: &str) -> Result<serde_json::Value, ScrapeError>;
}

/// A live headless Chrome tab
pub struct BrowserPage {
    tab: Arc<Tab>,
    config: BrowserConfig,
}

impl BrowserPage {
    pub fn new(tab: Arc<Tab>, config: BrowserConfig) -> Self {
        Self { tab, config }
    }

    fn evaluate_string(&self, script: &str) -> Result<String, ScrapeError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| ScrapeError::Browser(format!("Script evaluation failed: {}", e)))?;

        result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| ScrapeError::Browser("Script returned no string value".to_string()))
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

impl PageDriver for BrowserPage {
    fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        log::debug!("Browser navigating to: {}", url);

        self.tab
            .navigate_to(url)
            .map_err(|e| ScrapeError::navigation(url, e.to_string()))?
            .wait_until_navigated()
            .map_err(|e| ScrapeError::navigation(url, e.to_string()))?;

        if let Err(e) = self.tab.evaluate(STEALTH_SCRIPT, false) {
            log::debug!("Stealth script failed on {}: {}", url, e);
        }

        Ok(())
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| ScrapeError::ExtractionTimeout {
                selector: selector.to_string(),
                timeout_secs: timeout.as_secs(),
            })
    }

    fn settle(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn html(&self) -> Result<String, ScrapeError> {
        self.tab
            .get_content()
            .map_err(|e| ScrapeError::Browser(format!("HTML extraction failed: {}", e)))
    }

    fn visible_text(&self) -> Result<String, ScrapeError> {
        self.evaluate_string("document.body ? document.body.innerText : ''")
    }

    fn evaluate_json(&self, script: &str) -> Result<serde_json::Value, ScrapeError> {
        let raw = self.evaluate_string(script)?;
        serde_json::from_str(&raw)
            .map_err(|e| ScrapeError::Browser(format!("Script returned invalid JSON: {}", e)))
    }
}

impl std::fmt::Debug for BrowserPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserPage")
            .field("navigation_timeout", &self.config.navigation_timeout())
            .finish()
    }
}

/// A recorded page snapshot. Navigation always lands on the same HTML, and
/// scripts return the canned result given at construction.
#[derive(Debug, Default)]
pub struct StaticPage {
    html: String,
    text: Option<String>,
    script_result: Option<serde_json::Value>,
    visited: Mutex<Vec<String>>,
}

impl StaticPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }

    /// Override the rendered text; otherwise it is derived from the body's text nodes
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_script_result(mut self, value: serde_json::Value) -> Self {
        self.script_result = Some(value);
        self
    }

    /// URLs navigated to so far
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl PageDriver for StaticPage {
    fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(url.to_string());
        }
        Ok(())
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| ScrapeError::Structural(format!("invalid selector '{}': {}", selector, e)))?;
        let document = Html::parse_document(&self.html);
        if document.select(&parsed).next().is_some() {
            Ok(())
        } else {
            Err(ScrapeError::ExtractionTimeout {
                selector: selector.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }

    fn settle(&self, _duration: Duration) {}

    fn html(&self) -> Result<String, ScrapeError> {
        Ok(self.html.clone())
    }

    fn visible_text(&self) -> Result<String, ScrapeError> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        let document = Html::parse_document(&self.html);
        let body = Selector::parse("body").expect("static selector");
        let lines: Vec<String> = document
            .select(&body)
            .flat_map(|b| b.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Ok(lines.join("\n"))
    }

    fn evaluate_json(&self, _script: &str) -> Result<serde_json::Value, ScrapeError> {
        self.script_result
            .clone()
            .ok_or_else(|| ScrapeError::Browser("No script result recorded".to_string()))
    }
}
