//! Capability gaps detected by the agent factory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NeedStatus {
    Open,
    Addressed,
}

/// A profile theme or goal with no matching agent kind. Closed once a
/// spawned agent covering the gap passes validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentFactoryNeed {
    pub id: Uuid,
    /// The uncovered theme, doubling as the kind of the agent to spawn.
    pub kind: String,
    pub description: String,
    pub evidence: Vec<String>,
    pub status: NeedStatus,
    pub detected_at: DateTime<Utc>,
    /// Agent spawned to address this need, once one exists.
    pub spawned_agent: Option<Uuid>,
}

impl AgentFactoryNeed {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            description: description.into(),
            evidence: Vec::new(),
            status: NeedStatus::Open,
            detected_at: Utc::now(),
            spawned_agent: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }
}
