//! In-process event bus over a tokio broadcast channel

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use genos_common::{Event, Result};

use crate::{EventBus, EventStream};

/// Default channel capacity; a slow subscriber past this lags and drops
/// its oldest events rather than stalling publishers.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast-channel bus for tests and single-binary deployments.
pub struct MemoryBus {
    sender: broadcast::Sender<Event>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, event: &Event) -> Result<()> {
        // A send error only means no subscriber is currently attached;
        // fire-and-forget semantics make that a non-error.
        let _ = self.sender.send(event.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream> {
        let receiver = self.sender.subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "memory bus subscriber lagged, events dropped");
                    None
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_each_subscriber_receives_published_events() {
        let bus = MemoryBus::new();
        let mut first = bus.subscribe().await.unwrap();
        let mut second = bus.subscribe().await.unwrap();

        let event = Event::AgentCreated {
            agent_id: Uuid::new_v4(),
        };
        bus.publish(&event).await.unwrap();

        assert_eq!(first.next().await.unwrap(), event);
        assert_eq!(second.next().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = MemoryBus::new();
        bus.publish(&Event::AgentValidated {
            agent_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_subscription_preserves_order() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe().await.unwrap();

        for version in 1..=3u64 {
            bus.publish(&Event::ProfileUpdated {
                entity_id: Uuid::nil(),
                profile_version: version,
            })
            .await
            .unwrap();
        }
        for expected in 1..=3u64 {
            match sub.next().await.unwrap() {
                Event::ProfileUpdated {
                    profile_version, ..
                } => assert_eq!(profile_version, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}
