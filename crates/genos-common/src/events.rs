//! Bus event definitions
//!
//! Every message carried on the event bus is a variant of [`Event`],
//! serialized as tagged JSON. Inbound events originate outside the engine
//! (connectors, task runners); outbound events are published by engine
//! components.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All events carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    // Inbound
    RawDataIngested {
        entity_id: Uuid,
        item_id: Uuid,
    },
    TaskCompleted {
        agent_id: Uuid,
        success: bool,
        latency_ms: u64,
        feedback_score: Option<f64>,
        /// Idempotency key; replaying the same key must not double-count.
        dedupe_key: String,
    },
    FeedbackReceived {
        agent_id: Uuid,
        score: f64,
    },

    // Outbound
    ProfileUpdated {
        entity_id: Uuid,
        profile_version: u64,
    },
    StrategicReady {
        strategic_id: Uuid,
    },
    TacticalReady {
        tactical_id: Uuid,
    },
    HealthUpdated {
        agent_id: Uuid,
        score: f64,
    },
    AgentCreated {
        agent_id: Uuid,
    },
    AgentValidated {
        agent_id: Uuid,
    },
    AgentDeprecated {
        agent_id: Uuid,
    },
}

impl Event {
    /// Stable kind string, used as the bus subject suffix.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RawDataIngested { .. } => "raw_data_ingested",
            Event::TaskCompleted { .. } => "task_completed",
            Event::FeedbackReceived { .. } => "feedback_received",
            Event::ProfileUpdated { .. } => "profile_updated",
            Event::StrategicReady { .. } => "strategic_ready",
            Event::TacticalReady { .. } => "tactical_ready",
            Event::HealthUpdated { .. } => "health_updated",
            Event::AgentCreated { .. } => "agent_created",
            Event::AgentValidated { .. } => "agent_validated",
            Event::AgentDeprecated { .. } => "agent_deprecated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_round_trips_as_tagged_json() {
        let event = Event::TaskCompleted {
            agent_id: Uuid::new_v4(),
            success: true,
            latency_ms: 420,
            feedback_score: Some(0.8),
            dedupe_key: "task-42".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"task_completed\""));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_kind_matches_tag() {
        let event = Event::HealthUpdated {
            agent_id: Uuid::nil(),
            score: 0.5,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], event.kind());
    }
}
