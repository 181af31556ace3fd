// Library interface for ipl_scraper
// The binary and the integration tests both build on these modules

pub mod app_state;
pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod schedule;
pub mod scheduler;
pub mod site;
