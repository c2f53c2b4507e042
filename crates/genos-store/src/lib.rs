//! # Genos Store
//!
//! The profile store exclusively owns persisted state; every other
//! component reads and writes through the traits here. All writes are
//! single-record; agent mutation goes through a compare-and-swap on
//! `Agent.version`, so no two writers can advance the same record without
//! one of them retrying.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{
    AgentStore, HealthStore, InterpretationStore, LifecycleLog, NeedStore, ProfileStore,
};
