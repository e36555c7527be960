//! Prometheus metrics & middleware helper.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntGauge, Registry};

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::new(name, help).expect("valid counter definition")
}

fn gauge(name: &str, help: &str) -> IntGauge {
    IntGauge::new(name, help).expect("valid gauge definition")
}

pub static MATCHES_CREATED: Lazy<IntCounter> =
    Lazy::new(|| counter("pvp_matches_created_total", "Matches created"));
pub static MATCHES_FINISHED: Lazy<IntCounter> =
    Lazy::new(|| counter("pvp_matches_finished_total", "Matches settled"));
pub static SWEEP_FAILURES: Lazy<IntCounter> =
    Lazy::new(|| counter("pvp_sweep_failures_total", "Failed matchmaking sweep cycles"));
pub static QUEUE_PURGED: Lazy<IntCounter> =
    Lazy::new(|| counter("pvp_queue_purged_total", "Expired queue entries removed"));
pub static SWEEP_PAUSED: Lazy<IntGauge> =
    Lazy::new(|| gauge("pvp_sweep_paused", "1 while the sweep is backing off"));
pub static SEASON_CACHE_STALE: Lazy<IntGauge> = Lazy::new(|| {
    gauge(
        "pvp_season_cache_stale",
        "1 while the season is served from a stale cache",
    )
});

/// Registry shared by the HTTP middleware and the engine metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
        Box::new(MATCHES_CREATED.clone()),
        Box::new(MATCHES_FINISHED.clone()),
        Box::new(SWEEP_FAILURES.clone()),
        Box::new(QUEUE_PURGED.clone()),
        Box::new(SWEEP_PAUSED.clone()),
        Box::new(SEASON_CACHE_STALE.clone()),
    ];
    for c in collectors {
        if let Err(e) = registry.register(c) {
            log::warn!("metric registration failed: {e}");
        }
    }
    registry
});

/// Global Prometheus handle reused in tests.
pub static METRICS: Lazy<PrometheusMetrics> = Lazy::new(|| {
    PrometheusMetricsBuilder::new("api")
        .registry(REGISTRY.clone())
        .endpoint("/metrics") // exposed URL
        .build()
        .expect("metrics builder")
});
