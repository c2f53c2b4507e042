//! NATS-backed event bus adapter
//!
//! One subject per event kind under a configurable prefix, e.g.
//! `genos.events.task_completed`. Subscriptions cover the whole prefix
//! with a `>` wildcard; malformed payloads are logged and skipped so one
//! bad producer cannot wedge a consumer.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use genos_common::{Event, GenosError, Result};

use crate::{EventBus, EventStream};

/// Default subject prefix.
pub const DEFAULT_PREFIX: &str = "genos.events";

pub struct NatsBus {
    client: async_nats::Client,
    prefix: String,
}

impl NatsBus {
    /// Connect to a NATS server.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_prefix(url, DEFAULT_PREFIX).await
    }

    pub async fn connect_with_prefix(url: &str, prefix: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| GenosError::TransientIo(format!("nats connect {url}: {e}")))?;
        debug!(%url, %prefix, "connected to NATS");
        Ok(Self {
            client,
            prefix: prefix.to_string(),
        })
    }

    fn subject_for(&self, event: &Event) -> String {
        format!("{}.{}", self.prefix, event.kind())
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, event: &Event) -> Result<()> {
        let subject = self.subject_for(event);
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| GenosError::TransientIo(format!("nats publish: {e}")))?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream> {
        let subject = format!("{}.>", self.prefix);
        let subscriber = self
            .client
            .subscribe(subject)
            .await
            .map_err(|e| GenosError::TransientIo(format!("nats subscribe: {e}")))?;

        let stream = subscriber.filter_map(|message| async move {
            match serde_json::from_slice::<Event>(&message.payload) {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(subject = %message.subject, error = %err, "dropping malformed bus payload");
                    None
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
