//! # Genos DNA
//!
//! Profile synthesis: turns a bounded batch of raw interaction data into
//! profile deltas (new or reinforced interests, goals, values) and a
//! `profile_updated` event. Facets untouched for the staleness window are
//! deactivated, never deleted. A malformed completion response fails the
//! batch and requeues it; it never blocks later batches.

pub mod engine;
pub mod extraction;

pub use engine::{CycleOutcome, ProfileDelta, SynthesisConfig, SynthesisEngine};
pub use extraction::{ExtractedDna, ExtractedGoal, ExtractedInterest, ExtractedValue};
