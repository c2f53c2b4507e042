//! Rolling health aggregate per agent
//!
//! Derived state only: recomputed from each observation, never authored by
//! a human. The stored `score` stays neutral until the sample floor is
//! reached so new agents are not judged prematurely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::NEUTRAL_SCORE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentHealth {
    pub agent_id: Uuid,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_latency_ms: u64,
    pub sample_count: u64,
    /// Sum of explicit feedback scores, for the feedback average.
    pub feedback_total: f64,
    pub feedback_samples: u64,
    pub score: f64,
    pub last_updated: DateTime<Utc>,
}

impl AgentHealth {
    pub fn new(agent_id: Uuid) -> Self {
        Self {
            agent_id,
            success_count: 0,
            failure_count: 0,
            total_latency_ms: 0,
            sample_count: 0,
            feedback_total: 0.0,
            feedback_samples: 0,
            score: NEUTRAL_SCORE,
            last_updated: Utc::now(),
        }
    }

    /// Apply one observation's counter updates.
    pub fn record(&mut self, success: bool, latency_ms: u64, feedback_score: Option<f64>) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.total_latency_ms += latency_ms;
        self.sample_count += 1;
        if let Some(feedback) = feedback_score {
            self.feedback_total += feedback.clamp(0.0, 1.0);
            self.feedback_samples += 1;
        }
        self.last_updated = Utc::now();
    }

    pub fn success_rate(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.sample_count as f64
    }

    /// Average explicit feedback; neutral when none has arrived.
    pub fn avg_feedback(&self) -> f64 {
        if self.feedback_samples == 0 {
            return NEUTRAL_SCORE;
        }
        self.feedback_total / self.feedback_samples as f64
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        self.total_latency_ms as f64 / self.sample_count as f64
    }
}
