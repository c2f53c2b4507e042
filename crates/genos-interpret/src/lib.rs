//! # Genos Interpret
//!
//! Two strictly ordered interpretation stages over the profile:
//!
//! - [`StrategicStage`] reads the full active profile and produces
//!   cross-cutting themes with opportunities and risks
//! - [`TacticalStage`] refines the latest Strategic record into ranked
//!   action items, three priority areas, and success metrics
//!
//! Ordering is enforced by data dependency, not by a lock: a Tactical
//! record always references the Strategic record it was generated against,
//! and a newer Strategic record flags prior Tacticals stale instead of
//! aborting in-flight work.

pub mod strategic;
pub mod tactical;

pub use strategic::{StrategicStage, StrategicStageConfig};
pub use tactical::{TacticalStage, TacticalStageConfig};
