//! # Genos Bus
//!
//! Publish/subscribe abstraction over the shared event bus. Components
//! subscribe independently; publishing never runs a handler inline with the
//! publisher.
//!
//! Two implementations:
//!
//! - [`MemoryBus`]: in-process broadcast channel, used in tests and
//!   single-binary deployments
//! - [`NatsBus`]: NATS-backed adapter, one subject per event kind

pub mod memory;
pub mod nats;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use genos_common::{Event, Result};

/// A stream of decoded bus events.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// The bus seam every component publishes and subscribes through.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event. Returns once the bus has accepted it.
    async fn publish(&self, event: &Event) -> Result<()>;

    /// Open an independent subscription covering all event kinds.
    /// Callers filter for the kinds they consume.
    async fn subscribe(&self) -> Result<EventStream>;
}

pub use memory::MemoryBus;
pub use nats::NatsBus;
