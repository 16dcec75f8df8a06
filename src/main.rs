use anyhow::{Context, Result};
use std::sync::Arc;

use price_watch::broker::{LocalEventBus, MessageBroker, RedisBroker};
use price_watch::catalog::SqliteCatalog;
use price_watch::core::{self, BrokerKind, Config, HealthChecker, MonitorMetrics};
use price_watch::monitoring::{
    CacheJanitor, ChangeJournal, NotifierGate, ScanEngine, ScanSettings, Scheduler, SnapshotCache,
};
use price_watch::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("loading configuration")?;

    core::logging::init_logging(&config.server.log_level);

    tracing::info!("price-watch starting, version {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        poll_interval_ms = config.monitoring.poll_interval_ms,
        max_batch_size = config.monitoring.max_batch_size,
        notifications_enabled = config.monitoring.notifications_enabled,
        queue = %config.broker.queue_name,
        "monitoring configuration"
    );

    let metrics = MonitorMetrics::new()?;
    let health = Arc::new(HealthChecker::new());

    let catalog = Arc::new(
        SqliteCatalog::connect(&config.catalog.database_url)
            .await
            .with_context(|| format!("opening catalog {}", config.catalog.database_url))?,
    );
    health.update_component("catalog", true).await;

    let broker: Arc<dyn MessageBroker> = match config.broker.kind {
        BrokerKind::Redis => Arc::new(
            RedisBroker::connect(&config.broker.redis_url)
                .await
                .context("connecting to redis broker")?,
        ),
        BrokerKind::Local => {
            let bus = LocalEventBus::new(1024);
            spawn_event_logger(&bus);
            Arc::new(bus)
        }
    };
    health.update_component("broker", true).await;

    let journal = Arc::new(ChangeJournal::new(config.monitoring.journal_capacity));
    let notifier = Arc::new(
        NotifierGate::new(
            broker,
            config.broker.queue_name.clone(),
            config.monitoring.notifications_enabled,
            config.monitoring.collaborator_timeout(),
            journal.clone(),
            metrics.clone(),
        )
        .with_health(health.clone()),
    );

    let cache = Arc::new(SnapshotCache::new());
    let engine = Arc::new(
        ScanEngine::new(
            catalog,
            cache.clone(),
            notifier.clone(),
            ScanSettings {
                poll_interval: config.monitoring.poll_interval(),
                max_batch_size: config.monitoring.max_batch_size,
                collaborator_timeout: config.monitoring.collaborator_timeout(),
            },
            metrics.clone(),
        )
        .with_health(health.clone()),
    );
    let janitor = Arc::new(CacheJanitor::new(cache, metrics.clone()));

    let scheduler = Scheduler::start(
        engine.clone(),
        janitor,
        config.monitoring.poll_interval(),
        config.monitoring.janitor_interval(),
    );

    let state = Arc::new(AppState {
        engine: engine.clone(),
        notifier,
        journal,
        health: health.clone(),
        metrics,
    });
    tokio::spawn(server::serve(state, config.server.http_port));

    let mut heartbeat = tokio::time::interval(tokio::time::Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let status = engine.get_status().await;
                let health = health.get_status().await;
                tracing::info!(
                    "monitor status: {} (enabled: {}, cached: {}, uptime: {}s)",
                    health.status,
                    status.enabled,
                    status.cached_items,
                    health.uptime_seconds
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for shutdown signal")?;
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    scheduler.shutdown();
    Ok(())
}

fn spawn_event_logger(bus: &LocalEventBus) {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok((queue, event)) => match serde_json::to_string(&event) {
                    Ok(payload) => tracing::info!(queue = %queue, "{}", payload),
                    Err(e) => tracing::warn!("failed to encode event {}: {}", event.event_id, e),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
