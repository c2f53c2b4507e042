//! # Genos Evolution
//!
//! The darwinian half of the engine.
//!
//! ## Health Score
//!
//! ```text
//! score = 0.6 * success_rate + 0.25 * latency_score + 0.15 * avg_feedback
//! ```
//!
//! `latency_score` is the observation's percentile rank against a rolling
//! per-agent window (faster = higher). The score stays neutral (0.5) until
//! an agent has enough observations.
//!
//! ## Decision Table
//!
//! - score < 0.3 with enough samples: apoptosis (deprecate)
//! - 0.3 <= score < 0.6: evolution (regenerate configuration)
//! - score >= 0.85 with 2x samples: mitosis (duplicate), 24h lineage cooldown
//! - otherwise: hold
//!
//! All thresholds and weights are configuration, not law.

pub mod engine;
pub mod policy;
pub mod scorer;

pub use engine::{AppliedDecision, LifecycleEngine};
pub use policy::{decide, Decision, PolicyConfig};
pub use scorer::{HealthScorer, ScoringConfig};
