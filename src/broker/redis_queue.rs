use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::MessageBroker;
use crate::core::MonitorResult;
use crate::monitoring::ChangeEvent;

/// Pushes JSON-encoded events onto a Redis list named after the queue.
pub struct RedisBroker {
    connection: MultiplexedConnection,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> MonitorResult<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_tokio_connection().await?;
        tracing::info!(url, "connected to redis broker");
        Ok(Self { connection })
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, queue: &str, event: &ChangeEvent) -> MonitorResult<()> {
        let payload = serde_json::to_string(event)?;
        let mut connection = self.connection.clone();
        let depth: i64 = connection.rpush(queue, payload).await?;
        tracing::debug!(queue, item_id = event.item_id, depth, "event pushed to redis");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
