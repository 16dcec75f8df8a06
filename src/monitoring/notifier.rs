use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::events::ChangeEvent;
use super::journal::ChangeJournal;
use crate::broker::MessageBroker;
use crate::core::{HealthChecker, MonitorError, MonitorMetrics};

/// Enable toggle in front of the broker.
///
/// Publishing is best-effort and at-most-once: a failed or timed-out publish
/// is logged and the event is dropped. The flag is not persisted and starts
/// from the configured default on every run.
pub struct NotifierGate {
    enabled: AtomicBool,
    broker: Arc<dyn MessageBroker>,
    queue_name: String,
    publish_timeout: Duration,
    journal: Arc<ChangeJournal>,
    metrics: MonitorMetrics,
    health: Option<Arc<HealthChecker>>,
}

impl NotifierGate {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        queue_name: impl Into<String>,
        enabled: bool,
        publish_timeout: Duration,
        journal: Arc<ChangeJournal>,
        metrics: MonitorMetrics,
    ) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            broker,
            queue_name: queue_name.into(),
            publish_timeout,
            journal,
            metrics,
            health: None,
        }
    }

    /// Reports broker reachability from each publish attempt.
    pub fn with_health(mut self, health: Arc<HealthChecker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(
            "price change notifications {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn journal(&self) -> &Arc<ChangeJournal> {
        &self.journal
    }

    /// Hands `event` to the broker. Never fails from the caller's side.
    pub async fn publish(&self, event: ChangeEvent) {
        if !self.is_enabled() {
            tracing::debug!(item_id = event.item_id, "notifications disabled, dropping event");
            return;
        }

        tracing::info!(
            item_id = event.item_id,
            item = %event.item_name,
            "sending price change {:?} -> {}",
            event.old_price,
            event.new_price
        );

        let outcome = tokio::time::timeout(
            self.publish_timeout,
            self.broker.publish(&self.queue_name, &event),
        )
        .await
        .unwrap_or_else(|_| {
            Err(MonitorError::Timeout {
                operation: "broker publish",
                after_ms: self.publish_timeout.as_millis() as u64,
            })
        });

        match outcome {
            Ok(()) => {
                self.metrics.notifications_published.inc();
                tracing::info!(
                    item_id = event.item_id,
                    broker = self.broker.name(),
                    queue = %self.queue_name,
                    "price change notification sent"
                );
                self.journal.record(event);
                self.mark_broker(true).await;
            }
            Err(e) => {
                self.metrics.publish_failures.inc();
                tracing::error!(
                    item_id = event.item_id,
                    broker = self.broker.name(),
                    "failed to send price change notification: {}",
                    e
                );
                self.mark_broker(false).await;
            }
        }
    }

    async fn mark_broker(&self, reachable: bool) {
        if let Some(health) = &self.health {
            health.update_component("broker", reachable).await;
        }
    }
}
