//! # Genos Factory
//!
//! Fills capability gaps and gatekeeps new agents.
//!
//! Gap detection compares what the profile says matters (strategic themes,
//! active goals) against the kinds of agents that exist; an uncovered theme
//! becomes an [`genos_common::AgentFactoryNeed`] and, once it has stayed
//! open past the gap window, a freshly spawned `PendingQa` agent.
//!
//! Validation runs every `PendingQa` agent through a synthetic task battery
//! before it receives any traffic: pass activates, fail deprecates, no
//! automatic retry.

pub mod gap;
pub mod validation;

pub use gap::{AgentFactory, FactoryConfig, SweepReport};
pub use validation::{QaConfig, QaValidator, ValidationReport};
