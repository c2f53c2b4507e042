//! Profile ("DNA") facets: interests, goals, values
//!
//! Facets are append-friendly: they are deactivated, never deleted, so the
//! history stays available for re-analysis. Confidence and importance are
//! clamped to [0, 1] on every construction and merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clamp a score into [0, 1]. NaN collapses to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A topic or domain the entity has shown recurring interest in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interest {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_reinforced: DateTime<Utc>,
    pub active: bool,
}

impl Interest {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            confidence: clamp01(confidence),
            first_seen: now,
            last_reinforced: now,
            active: true,
        }
    }

    /// Merge a reobservation: `new = old_weight*old + observed_weight*observed`.
    pub fn reinforce(&mut self, observed: f64, old_weight: f64, observed_weight: f64) {
        self.confidence =
            clamp01(old_weight * self.confidence + observed_weight * clamp01(observed));
        self.last_reinforced = Utc::now();
        self.active = true;
    }
}

/// Goal lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Archived,
}

/// An objective the entity wants to achieve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// 1..=10, higher is more important.
    pub priority: u8,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(title: impl Into<String>, priority: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            priority: priority.clamp(1, 10),
            status: GoalStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A core value: a principle that matters to the entity.
///
/// Named `EntityValue` to avoid colliding with `serde_json::Value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityValue {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
}

impl EntityValue {
    pub fn new(name: impl Into<String>, importance: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            importance: clamp01(importance),
            created_at: Utc::now(),
        }
    }

    pub fn merge_importance(&mut self, observed: f64, old_weight: f64, observed_weight: f64) {
        self.importance =
            clamp01(old_weight * self.importance + observed_weight * clamp01(observed));
    }
}
