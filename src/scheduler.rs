use crate::app_state::AppState;
use actix_web::web;
use std::time::Duration;

/// Preload every season, then refresh the recent ones on a fixed interval
pub fn spawn(data: web::Data<AppState>) {
    let data_clone = data.clone();
    actix_web::rt::spawn(async move {
        let orchestrator = data_clone.orchestrator.clone();
        let refresh = data_clone.config.refresh.clone();

        if refresh.preload_on_start {
            let report = orchestrator.preload().await;
            if !report.failed.is_empty() {
                log::warn!(
                    "Preload left {} keys without fresh data: {:?}",
                    report.failed.len(),
                    report.failed.iter().map(|f| f.key.as_str()).collect::<Vec<_>>()
                );
            }
        }

        let interval = Duration::from_secs(refresh.interval_minutes.max(1) * 60);
        log::info!("Auto-refresh enabled every {} minutes", refresh.interval_minutes);

        loop {
            // sleep between cycles
            actix_web::rt::time::sleep(interval).await;

            let report = orchestrator.refresh_recent().await;
            log::info!(
                "Periodic refresh done: {} refreshed, {} failed",
                report.refreshed.len(),
                report.failed.len()
            );
        }
    });
}
