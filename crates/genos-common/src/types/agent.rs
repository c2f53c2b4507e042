//! Agent record
//!
//! An agent is a specialized worker with a versioned configuration. The
//! `version` field is the compare-and-swap token for every write; it only
//! ever increases. Deprecated agents are kept for audit, never hard-deleted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation state machine: `PendingQa -> Active` on pass,
/// `PendingQa -> Deprecated` on fail. No agent receives traffic while
/// `PendingQa`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    PendingQa,
    Active,
    Deprecated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: Uuid,
    /// Unique across the deployment.
    pub name: String,
    /// Task class this agent serves (e.g. "briefing", "scheduling").
    pub kind: String,
    /// Immutable core purpose; regeneration never rewrites it.
    pub purpose: String,
    /// Adaptive system configuration, rewritten by the prompt generator.
    pub system_config: String,
    pub tool_grants: Vec<String>,
    /// Monotonic; the optimistic-concurrency token.
    pub version: u64,
    pub status: AgentStatus,
    /// Groups an agent with its mitosis clones for the duplication cooldown.
    pub lineage: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        purpose: impl Into<String>,
        system_config: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            kind: kind.into(),
            purpose: purpose.into(),
            system_config: system_config.into(),
            tool_grants: Vec::new(),
            version: 1,
            status: AgentStatus::PendingQa,
            lineage: id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tool_grants(mut self, grants: Vec<String>) -> Self {
        self.tool_grants = grants;
        self
    }

    /// Mitosis clone: new id, version reset to 1, same configuration and
    /// lineage, gated through QA before receiving traffic.
    pub fn clone_for_mitosis(&self, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind: self.kind.clone(),
            purpose: self.purpose.clone(),
            system_config: self.system_config.clone(),
            tool_grants: self.tool_grants.clone(),
            version: 1,
            status: AgentStatus::PendingQa,
            lineage: self.lineage,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_agent_starts_pending_qa_at_version_one() {
        let agent = Agent::new("briefer-1", "briefing", "daily briefings", "You are...");
        assert_eq!(agent.version, 1);
        assert_eq!(agent.status, AgentStatus::PendingQa);
        assert_eq!(agent.lineage, agent.id);
    }

    #[test]
    fn test_mitosis_clone_resets_version_and_keeps_lineage() {
        let mut source = Agent::new("briefer-1", "briefing", "daily briefings", "You are...")
            .with_tool_grants(vec!["calendar".into()]);
        source.version = 7;
        source.status = AgentStatus::Active;

        let clone = source.clone_for_mitosis("briefer-2");
        assert_ne!(clone.id, source.id);
        assert_eq!(clone.version, 1);
        assert_eq!(clone.status, AgentStatus::PendingQa);
        assert_eq!(clone.lineage, source.lineage);
        assert_eq!(clone.system_config, source.system_config);
        assert_eq!(clone.tool_grants, source.tool_grants);
    }
}
