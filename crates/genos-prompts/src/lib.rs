//! # Genos Prompts
//!
//! Regenerates each agent's adaptive configuration from the current
//! profile and the latest non-stale tactical plan. The agent's core
//! `purpose` is never rewritten. Writes go through the store's
//! compare-and-swap; a concurrency conflict re-reads and retries with
//! fresh data, bounded to three attempts.

pub mod generator;

pub use generator::{ChangeClass, GeneratorConfig, PromptGenerator, RegenerationReport};
