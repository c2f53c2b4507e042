//! Raw data queued for profile synthesis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ingested item (conversation turn, document, interaction) awaiting
/// synthesis. Items live on the queue until a batch takes them; a failed
/// batch requeues its items for the next run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDataItem {
    pub id: Uuid,
    pub entity_id: Uuid,
    /// Origin connector, e.g. "conversation", "email", "calendar".
    pub source: String,
    pub content: String,
    pub ingested_at: DateTime<Utc>,
}

impl RawDataItem {
    pub fn new(entity_id: Uuid, source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            source: source.into(),
            content: content.into(),
            ingested_at: Utc::now(),
        }
    }
}
