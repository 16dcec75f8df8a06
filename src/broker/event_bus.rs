use async_trait::async_trait;
use tokio::sync::broadcast;

use super::MessageBroker;
use crate::core::MonitorResult;
use crate::monitoring::ChangeEvent;

/// In-process broker: fans events out to every live subscriber.
pub struct LocalEventBus {
    sender: broadcast::Sender<(String, ChangeEvent)>,
}

impl LocalEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, ChangeEvent)> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl MessageBroker for LocalEventBus {
    async fn publish(&self, queue: &str, event: &ChangeEvent) -> MonitorResult<()> {
        match self.sender.send((queue.to_string(), event.clone())) {
            Ok(receivers) => {
                tracing::debug!(queue, item_id = event.item_id, receivers, "event published");
            }
            Err(_) => {
                // Nobody listening is not a transport failure.
                tracing::debug!(queue, item_id = event.item_id, "event published with no subscribers");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Item;
    use chrono::Utc;

    fn event() -> ChangeEvent {
        let item = Item {
            id: 5,
            name: "Lamp".to_string(),
            category: "home".to_string(),
            current_price: Some("20".parse().unwrap()),
            last_modified: Utc::now(),
            revision: 2,
        };
        ChangeEvent::from_prices(&item, Some("25".parse().unwrap()), "20".parse().unwrap(), "test").unwrap()
    }

    #[tokio::test]
    async fn test_subscriber_receives_event_with_queue() {
        let bus = LocalEventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish("price-changes", &event()).await.unwrap();

        let (queue, received) = rx.recv().await.unwrap();
        assert_eq!(queue, "price-changes");
        assert_eq!(received.item_id, 5);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = LocalEventBus::new(8);
        assert!(bus.publish("price-changes", &event()).await.is_ok());
    }
}
