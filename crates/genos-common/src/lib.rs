//! # Genos Common
//!
//! Shared types, events, and errors for the Genos agent lifecycle engine.
//!
//! ## Core Types
//!
//! - [`Entity`]: the single owner all other records hang off
//! - [`Interest`]/[`Goal`]/[`EntityValue`]: profile ("DNA") facets
//! - [`Agent`]: a specialized worker with a versioned configuration
//! - [`AgentHealth`]: rolling performance aggregate per agent
//! - [`LifecycleEvent`]: append-only audit trail of lifecycle actions
//! - [`AgentFactoryNeed`]: a detected capability gap
//! - [`Event`]: every message carried on the bus
//!
//! ## Errors
//!
//! [`GenosError`] is the unified error type; the variants map one-to-one
//! onto the failure classes the engine distinguishes (transient IO,
//! malformed model output, concurrency conflict, policy violation,
//! validation failure).

pub mod error;
pub mod events;
pub mod retry;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{GenosError, Result};
pub use events::Event;
pub use types::{
    agent::{Agent, AgentStatus},
    entity::Entity,
    facet::{clamp01, EntityValue, Goal, GoalStatus, Interest},
    health::AgentHealth,
    interpretation::{ActionItem, Strategic, Tactical},
    lifecycle::{LifecycleEvent, LifecycleKind},
    need::{AgentFactoryNeed, NeedStatus},
    raw_data::RawDataItem,
};

/// Genos version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum raw data items per synthesis batch
pub const DEFAULT_BATCH_CAP: usize = 100;

/// Days without reinforcement before a facet is deactivated
pub const DEFAULT_STALENESS_DAYS: i64 = 90;

/// Weight of the existing confidence when merging a reobserved facet
pub const MERGE_OLD_WEIGHT: f64 = 0.7;

/// Weight of the newly observed confidence when merging
pub const MERGE_OBSERVED_WEIGHT: f64 = 0.3;

/// Observations required before a health score is authoritative
pub const SAMPLE_FLOOR: u64 = 5;

/// Score reported while below the sample floor
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Below this score (with enough samples) an agent is retired
pub const APOPTOSIS_THRESHOLD: f64 = 0.3;

/// Below this score an agent's configuration is regenerated
pub const EVOLUTION_THRESHOLD: f64 = 0.6;

/// At or above this score (with 2x floor samples) an agent is duplicated
pub const MITOSIS_THRESHOLD: f64 = 0.85;

/// Hours between duplications of the same lineage
pub const MITOSIS_COOLDOWN_HOURS: i64 = 24;

/// QA pass rate required before activation
pub const QA_PASS_THRESHOLD: f64 = 0.8;

/// Synthetic tasks in a QA battery
pub const QA_BATTERY_SIZE: usize = 5;

/// Bounded concurrency per component worker pool
pub const DEFAULT_WORKER_PERMITS: usize = 5;

/// Timeout for a single completion-service call
pub const COMPLETION_TIMEOUT_SECS: u64 = 30;
