//! Lifecycle audit trail
//!
//! Append-only log of every lifecycle action taken on an agent. Entries
//! are never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Spawn,
    Evolve,
    Duplicate,
    Deprecate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleEvent {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub kind: LifecycleKind,
    pub reason: String,
    pub triggering_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(
        agent_id: Uuid,
        kind: LifecycleKind,
        reason: impl Into<String>,
        triggering_score: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            kind,
            reason: reason.into(),
            triggering_score,
            timestamp: Utc::now(),
        }
    }
}
