//! Error taxonomy for browser sessions and extraction.
//!
//! Per-record problems (`ValidationRejected`) are logged and swallowed by the
//! extractors. Everything else bubbles up to the orchestrator, which turns it
//! into an error-shaped cache entry instead of crashing the process.

/// Errors that can occur while driving the browser or extracting data
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScrapeError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation to {url} timed out")]
    NavigationTimeout { url: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {timeout_secs}s waiting for `{selector}`")]
    ExtractionTimeout { selector: String, timeout_secs: u64 },

    #[error("Unexpected page structure: {0}")]
    Structural(String),

    #[error("Record rejected: {0}")]
    ValidationRejected(String),

    #[error("Upstream returned no {0}")]
    UpstreamEmpty(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

impl ScrapeError {
    /// Short machine-readable category, used for metrics and error-shaped cache entries
    pub fn category(&self) -> &'static str {
        match self {
            ScrapeError::Launch(_) => "launch",
            ScrapeError::NavigationTimeout { .. } => "navigation-timeout",
            ScrapeError::Navigation { .. } => "navigation",
            ScrapeError::ExtractionTimeout { .. } => "extraction-timeout",
            ScrapeError::Structural(_) => "structural",
            ScrapeError::ValidationRejected(_) => "validation",
            ScrapeError::UpstreamEmpty(_) => "upstream-empty",
            ScrapeError::Browser(_) => "browser",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ScrapeError::NavigationTimeout { .. } | ScrapeError::ExtractionTimeout { .. }
        )
    }

    /// Classify a raw navigation failure coming out of the CDP layer
    pub fn navigation(url: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ScrapeError::NavigationTimeout {
                url: url.to_string(),
            }
        } else {
            ScrapeError::Navigation {
                url: url.to_string(),
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_classification() {
        let err = ScrapeError::navigation("https://x", "Timeout while waiting for event");
        assert!(matches!(err, ScrapeError::NavigationTimeout { .. }));
        assert!(err.is_timeout());

        let err = ScrapeError::navigation("https://x", "net::ERR_NAME_NOT_RESOLVED");
        assert!(matches!(err, ScrapeError::Navigation { .. }));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_categories() {
        assert_eq!(ScrapeError::Launch("x".into()).category(), "launch");
        assert_eq!(ScrapeError::Structural("x".into()).category(), "structural");
        assert_eq!(
            ScrapeError::ExtractionTimeout {
                selector: "table".into(),
                timeout_secs: 10
            }
            .category(),
            "extraction-timeout"
        );
    }
}
