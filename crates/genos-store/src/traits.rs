//! Store traits
//!
//! One trait per record family, all scoped to the single deployment
//! Entity. Implementations must keep every write single-record: no
//! long-held locks, so a slow consumer never stalls another.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use genos_common::{
    Agent, AgentFactoryNeed, AgentHealth, AgentStatus, Entity, EntityValue, Goal, Interest,
    LifecycleEvent, RawDataItem, Result, Strategic, Tactical,
};

/// Profile (DNA) facets, the raw-data queue, and the profile version.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn entity(&self) -> Result<Entity>;
    async fn rename_entity(&self, name: &str) -> Result<()>;

    /// Insert or replace an interest, keyed by name.
    async fn upsert_interest(&self, interest: Interest) -> Result<()>;
    async fn interests(&self, active_only: bool) -> Result<Vec<Interest>>;
    /// Deactivate interests not reinforced since `cutoff`. Returns how many.
    async fn deactivate_stale_interests(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn upsert_goal(&self, goal: Goal) -> Result<()>;
    async fn goals(&self, active_only: bool) -> Result<Vec<Goal>>;

    async fn upsert_value(&self, value: EntityValue) -> Result<()>;
    async fn values(&self) -> Result<Vec<EntityValue>>;

    async fn profile_version(&self) -> Result<u64>;
    /// Increment and return the new profile version.
    async fn bump_profile_version(&self) -> Result<u64>;

    async fn enqueue_raw(&self, item: RawDataItem) -> Result<()>;
    /// Remove and return up to `cap` unprocessed items. A failed batch is
    /// handed back through [`ProfileStore::requeue_raw`].
    async fn take_unprocessed(&self, cap: usize) -> Result<Vec<RawDataItem>>;
    async fn requeue_raw(&self, items: Vec<RawDataItem>) -> Result<()>;
}

/// Strategic and Tactical interpretation records.
#[async_trait]
pub trait InterpretationStore: Send + Sync {
    /// Store a new Strategic record and flag every prior Tactical stale.
    async fn put_strategic(&self, record: Strategic) -> Result<()>;
    async fn latest_strategic(&self) -> Result<Option<Strategic>>;
    async fn get_strategic(&self, id: Uuid) -> Result<Option<Strategic>>;

    /// Store a Tactical record. If its `strategic_ref` is no longer the
    /// latest Strategic, the record is written already flagged stale.
    async fn put_tactical(&self, record: Tactical) -> Result<Tactical>;
    /// Latest non-stale Tactical, if any.
    async fn latest_tactical(&self) -> Result<Option<Tactical>>;
    async fn get_tactical(&self, id: Uuid) -> Result<Option<Tactical>>;
}

/// Agent records. `update` is the only mutation path for configuration.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Create an agent; names are unique across the deployment.
    async fn create(&self, agent: Agent) -> Result<Agent>;
    async fn get(&self, id: Uuid) -> Result<Option<Agent>>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Agent>>;
    async fn list(&self, status: Option<AgentStatus>) -> Result<Vec<Agent>>;

    /// Compare-and-swap write: rejected with `ConcurrencyConflict` when the
    /// stored version differs from `expected_version`. The incoming agent
    /// must carry a strictly greater version.
    async fn update(&self, agent: Agent, expected_version: u64) -> Result<Agent>;

    /// Status transition (activation, deprecation). Does not bump the
    /// configuration version.
    async fn set_status(&self, id: Uuid, status: AgentStatus) -> Result<Agent>;
}

/// Rolling health aggregates and task-completion dedupe keys.
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Current health, or a fresh neutral aggregate for an unseen agent.
    async fn get_or_default(&self, agent_id: Uuid) -> Result<AgentHealth>;
    async fn put(&self, health: AgentHealth) -> Result<()>;
    async fn all(&self) -> Result<Vec<AgentHealth>>;

    /// Atomically claim a dedupe key; returns false when the key was
    /// already claimed (the observation must then be dropped). Concurrent
    /// claims of one key admit exactly one caller.
    async fn claim_dedupe_key(&self, key: &str) -> Result<bool>;

    /// Give a claimed key back so a redelivery can retry the observation.
    /// Called only when the write the claim guarded failed.
    async fn release_dedupe_key(&self, key: &str) -> Result<()>;
}

/// Append-only lifecycle audit trail.
#[async_trait]
pub trait LifecycleLog: Send + Sync {
    async fn append(&self, event: LifecycleEvent) -> Result<()>;
    async fn for_agent(&self, agent_id: Uuid) -> Result<Vec<LifecycleEvent>>;
    async fn all(&self) -> Result<Vec<LifecycleEvent>>;
}

/// Capability gaps detected by the factory.
#[async_trait]
pub trait NeedStore: Send + Sync {
    /// Create or refresh the open need for `kind`, extending its evidence.
    async fn upsert_open(&self, need: AgentFactoryNeed) -> Result<AgentFactoryNeed>;
    async fn open_needs(&self) -> Result<Vec<AgentFactoryNeed>>;
    async fn set_spawned(&self, id: Uuid, agent_id: Uuid) -> Result<()>;
    /// Drop the spawned-agent reference when that agent no longer covers
    /// the gap, reopening the need for a fresh spawn.
    async fn clear_spawned(&self, id: Uuid) -> Result<()>;
    async fn mark_addressed(&self, id: Uuid) -> Result<()>;
    /// Open need (if any) whose spawned agent is `agent_id`.
    async fn open_need_for_agent(&self, agent_id: Uuid) -> Result<Option<AgentFactoryNeed>>;
}
