//! The Entity: the single owner of a deployment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single human or organization the deployment serves. All other
/// records reference it. Immutable after creation except rename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Rename is the only permitted mutation.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}
