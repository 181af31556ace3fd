//! Browser fingerprints handed to each new page.
//!
//! The pools below are rotated by [`RandomIdentity`]; tests pin a
//! [`FixedIdentity`] so page setup is deterministic.

use rand::seq::SliceRandom;

/// User agents to rotate through to avoid bot detection
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

pub const VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1366, 768),
    (1440, 900),
    (1536, 864),
    (1280, 720),
];

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-US,en;q=0.8,es;q=0.7",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.9,fr;q=0.8",
    "en-US,en;q=0.7,de;q=0.6",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserIdentity {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub accept_language: String,
}

impl BrowserIdentity {
    /// Browser-like request headers sent with every navigation
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8"
                    .to_string(),
            ),
            ("Accept-Language", self.accept_language.clone()),
            ("Accept-Encoding", "gzip, deflate, br".to_string()),
            ("DNT", "1".to_string()),
            ("Connection", "keep-alive".to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
        ]
    }
}

/// Supplies the fingerprint for each new page
pub trait IdentityProvider: Send + Sync {
    fn next_identity(&self) -> BrowserIdentity;
}

/// Picks a random entry from each pool
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdentity;

impl IdentityProvider for RandomIdentity {
    fn next_identity(&self) -> BrowserIdentity {
        let mut rng = rand::thread_rng();
        BrowserIdentity {
            user_agent: USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0]).to_string(),
            viewport: *VIEWPORTS.choose(&mut rng).unwrap_or(&VIEWPORTS[0]),
            accept_language: ACCEPT_LANGUAGES
                .choose(&mut rng)
                .unwrap_or(&ACCEPT_LANGUAGES[0])
                .to_string(),
        }
    }
}

/// Always hands out the same identity
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub BrowserIdentity);

impl Default for FixedIdentity {
    fn default() -> Self {
        Self(BrowserIdentity {
            user_agent: USER_AGENTS[0].to_string(),
            viewport: VIEWPORTS[0],
            accept_language: ACCEPT_LANGUAGES[0].to_string(),
        })
    }
}

impl IdentityProvider for FixedIdentity {
    fn next_identity(&self) -> BrowserIdentity {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_identity_draws_from_pools() {
        let provider = RandomIdentity;
        for _ in 0..20 {
            let id = provider.next_identity();
            assert!(USER_AGENTS.contains(&id.user_agent.as_str()));
            assert!(VIEWPORTS.contains(&id.viewport));
            assert!(ACCEPT_LANGUAGES.contains(&id.accept_language.as_str()));
        }
    }

    #[test]
    fn test_fixed_identity_is_stable() {
        let provider = FixedIdentity::default();
        assert_eq!(provider.next_identity(), provider.next_identity());
    }

    #[test]
    fn test_headers_carry_accept_language() {
        let id = FixedIdentity::default().next_identity();
        let headers = id.headers();
        assert!(headers
            .iter()
            .any(|(name, value)| *name == "Accept-Language" && value == "en-US,en;q=0.9"));
    }
}
