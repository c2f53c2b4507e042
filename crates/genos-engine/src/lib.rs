//! # Genos Engine
//!
//! Wires the Genos components to an event bus and runs them: DNA
//! synthesis, two-tier interpretation, prompt generation, health scoring,
//! lifecycle decisions, the agent factory, and QA validation.

pub mod config;
pub mod runtime;

pub use config::{BusMode, EngineConfig};
pub use runtime::Runtime;
