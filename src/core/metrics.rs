use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use super::error::{MonitorError, MonitorResult};

/// Prometheus counters for the scan engine, notifier and janitor.
///
/// Each handle owns its own registry so tests can build independent
/// instances without colliding on the global default registry.
#[derive(Clone)]
pub struct MonitorMetrics {
    registry: Registry,
    pub cycles_run: IntCounter,
    pub cycles_skipped: IntCounter,
    pub cycles_failed: IntCounter,
    pub items_diffed: IntCounter,
    pub item_failures: IntCounter,
    pub notifications_published: IntCounter,
    pub publish_failures: IntCounter,
    pub snapshots_evicted: IntCounter,
    pub cache_size: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> MonitorResult<IntCounter> {
    let counter = IntCounter::new(name, help).map_err(metrics_error)?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(metrics_error)?;
    Ok(counter)
}

fn metrics_error(err: prometheus::Error) -> MonitorError {
    MonitorError::Config(format!("metrics registration failed: {}", err))
}

impl MonitorMetrics {
    pub fn new() -> MonitorResult<Self> {
        let registry = Registry::new();

        let cache_size = IntGauge::new(
            "price_watch_cache_size",
            "Snapshots currently held in the cache",
        )
        .map_err(metrics_error)?;
        registry
            .register(Box::new(cache_size.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            cycles_run: counter(&registry, "price_watch_cycles_total", "Scan cycles completed")?,
            cycles_skipped: counter(
                &registry,
                "price_watch_cycles_skipped_total",
                "Scan cycles skipped because notifications were disabled",
            )?,
            cycles_failed: counter(
                &registry,
                "price_watch_cycles_failed_total",
                "Scan cycles aborted before the watermark advanced",
            )?,
            items_diffed: counter(&registry, "price_watch_items_diffed_total", "Items diffed")?,
            item_failures: counter(
                &registry,
                "price_watch_item_failures_total",
                "Items skipped because processing failed",
            )?,
            notifications_published: counter(
                &registry,
                "price_watch_notifications_published_total",
                "Change events handed to the broker",
            )?,
            publish_failures: counter(
                &registry,
                "price_watch_publish_failures_total",
                "Change events dropped after a broker failure",
            )?,
            snapshots_evicted: counter(
                &registry,
                "price_watch_snapshots_evicted_total",
                "Snapshots removed by the janitor",
            )?,
            cache_size,
            registry,
        })
    }

    pub fn render(&self) -> MonitorResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer)
            .map_err(|e| MonitorError::Config(format!("metrics output is not utf-8: {}", e)))
    }
}
