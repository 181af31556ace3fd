use actix_web::{web, App, HttpServer};
use ipl_scraper::app_state::AppState;
use ipl_scraper::browser::{BrowserManager, RandomIdentity};
use ipl_scraper::cache::{CacheStore, Clock, SystemClock};
use ipl_scraper::config::Config;
use ipl_scraper::metrics::MetricsTracker;
use ipl_scraper::orchestrator::Orchestrator;
use ipl_scraper::site::BrowserSiteScraper;
use ipl_scraper::{handlers, scheduler};
use log::{info, warn};
use std::sync::Arc;

fn init_logging() {
    use log4rs::append::console::ConsoleAppender;
    use log4rs::config::{Appender, Config as LogConfig, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) else {
        return;
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}")))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(log::LevelFilter::Info));

    match config {
        Ok(config) => {
            if log4rs::init_config(config).is_ok() {
                warn!("log4rs.yml not loaded ({}), logging to console", e);
            }
        }
        Err(err) => eprintln!("Failed to configure logging: {}", err),
    }
}

fn build_cache(cfg: &Config) -> CacheStore {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    if !cfg.cache.persist {
        return CacheStore::new(clock);
    }
    match CacheStore::with_persistence(cfg.cache.dir.clone(), clock.clone()) {
        Ok(cache) => cache,
        Err(e) => {
            warn!("Cache persistence disabled: {}", e);
            CacheStore::new(clock)
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let cfg = Config::load();
    info!("Tracking seasons {}-{}", cfg.refresh.first_year, cfg.refresh.last_year);
    info!("  Recent seasons: {:?}", cfg.refresh.recent());
    info!("  Refresh interval: {} minutes", cfg.refresh.interval_minutes);
    info!("  Teams policy: {:?}", cfg.refresh.teams_policy);
    info!("  Headless: {}", cfg.browser.headless);

    let cache = Arc::new(build_cache(&cfg));
    let manager = BrowserManager::new(cfg.browser.clone(), Arc::new(RandomIdentity));
    let scraper = Arc::new(BrowserSiteScraper::new(manager, cfg.site.base_url.clone()));
    let metrics = Arc::new(MetricsTracker::new());

    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        scraper,
        metrics,
        cfg.refresh.clone(),
        cfg.cache.clone(),
    ));

    let data = web::Data::new(AppState::new(orchestrator, cfg.clone()));

    // start background preload and refresh loop
    scheduler::spawn(data.clone());

    // Try to bind to an available port in the configured range
    let mut last_err: Option<std::io::Error> = None;
    for port in cfg.server.port_start..=cfg.server.port_end {
        let data_clone = data.clone();
        let addr = format!("{}:{}", cfg.server.host, port);
        match HttpServer::new(move || {
            App::new()
                .app_data(data_clone.clone())
                .configure(handlers::configure)
        })
        .bind(&addr)
        {
            Ok(server) => {
                info!("Listening on {}", addr);
                return server.run().await;
            }
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            format!(
                "No available ports {}-{}",
                cfg.server.port_start, cfg.server.port_end
            ),
        )
    }))
}
