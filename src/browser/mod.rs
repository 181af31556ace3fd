//! Headless browser sessions for scraping the JavaScript-rendered IPL site
//!
//! A [`BrowserManager`] launches one Chrome process per [`Session`]; each
//! page it opens gets a fingerprint from the configured
//! [`IdentityProvider`]. Extractors only see the [`PageDriver`] trait, so they
//! run unchanged against a recorded [`StaticPage`].
//!
//! # Example
//!
//! ```no_run
//! use ipl_scraper::browser::{BrowserConfig, BrowserManager, PageDriver, RandomIdentity};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = BrowserManager::new(BrowserConfig::default(), Arc::new(RandomIdentity));
//! let session = manager.create_session()?;
//! let page = manager.create_page(&session)?;
//!
//! page.navigate("https://www.iplt20.com/points-table/men/2025")?;
//! page.wait_for_selector("table", std::time::Duration::from_secs(10))?;
//! println!("Extracted {} bytes of HTML", page.html()?.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod identity;
pub mod manager;
pub mod page;

pub use config::BrowserConfig;
pub use identity::{BrowserIdentity, FixedIdentity, IdentityProvider, RandomIdentity};
pub use manager::{BrowserManager, Session};
pub use page::{BrowserPage, PageDriver, StaticPage};
