//! Interpretation records
//!
//! Two ordered tiers: a Strategic record is derived from the full active
//! profile; a Tactical record refines exactly one Strategic record. A new
//! Strategic record invalidates (flags stale, does not delete) every prior
//! Tactical record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cross-cutting themes and opportunities read out of the profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Strategic {
    pub id: Uuid,
    pub themes: Vec<String>,
    pub opportunities: Vec<String>,
    pub risks: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl Strategic {
    pub fn new(themes: Vec<String>, opportunities: Vec<String>, risks: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            themes,
            opportunities,
            risks,
            generated_at: Utc::now(),
        }
    }
}

/// One ranked action item in a tactical plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionItem {
    pub description: String,
    /// 1 is highest.
    pub rank: u8,
}

/// Tactical refinement of a Strategic record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tactical {
    pub id: Uuid,
    /// The Strategic record this plan refines. Always a record that
    /// existed at or before `generated_at`.
    pub strategic_ref: Uuid,
    pub action_items: Vec<ActionItem>,
    /// Exactly the top 3 priority areas.
    pub priority_areas: Vec<String>,
    pub success_metrics: Vec<String>,
    pub generated_at: DateTime<Utc>,
    /// Set once a newer Strategic record supersedes this plan; stale plans
    /// are kept for audit but never trusted.
    pub stale: bool,
}

impl Tactical {
    pub fn new(
        strategic_ref: Uuid,
        action_items: Vec<ActionItem>,
        priority_areas: Vec<String>,
        success_metrics: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategic_ref,
            action_items,
            priority_areas,
            success_metrics,
            generated_at: Utc::now(),
            stale: false,
        }
    }
}
