pub mod event_bus;
pub mod redis_queue;

use async_trait::async_trait;

use crate::core::MonitorResult;
use crate::monitoring::ChangeEvent;

pub use event_bus::LocalEventBus;
pub use redis_queue::RedisBroker;

/// Transport that carries change events to downstream consumers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, queue: &str, event: &ChangeEvent) -> MonitorResult<()>;

    fn name(&self) -> &'static str;
}
