//! In-memory store implementation
//!
//! DashMap-backed, single deployment Entity. Facets are keyed by
//! normalized name so exact-match reconciliation is a plain lookup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use genos_common::{
    Agent, AgentFactoryNeed, AgentHealth, AgentStatus, Entity, EntityValue, GenosError, Goal,
    GoalStatus, Interest, LifecycleEvent, NeedStatus, RawDataItem, Result, Strategic, Tactical,
};

use crate::traits::{
    AgentStore, HealthStore, InterpretationStore, LifecycleLog, NeedStore, ProfileStore,
};

fn facet_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A dedupe key older than this can no longer guard a redelivery and is
/// evicted on the next claim, keeping the set bounded.
const DEDUPE_RETENTION_HOURS: i64 = 24;

pub struct MemoryStore {
    entity: RwLock<Entity>,
    interests: DashMap<String, Interest>,
    goals: DashMap<String, Goal>,
    values: DashMap<String, EntityValue>,
    profile_version: AtomicU64,
    raw_queue: Mutex<VecDeque<RawDataItem>>,

    strategics: RwLock<Vec<Strategic>>,
    tacticals: RwLock<Vec<Tactical>>,

    agents: DashMap<Uuid, Agent>,
    agent_names: DashMap<String, Uuid>,

    healths: DashMap<Uuid, AgentHealth>,
    dedupe_keys: DashMap<String, DateTime<Utc>>,

    lifecycle: RwLock<Vec<LifecycleEvent>>,
    needs: DashMap<Uuid, AgentFactoryNeed>,
}

impl MemoryStore {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity: RwLock::new(entity),
            interests: DashMap::new(),
            goals: DashMap::new(),
            values: DashMap::new(),
            profile_version: AtomicU64::new(0),
            raw_queue: Mutex::new(VecDeque::new()),
            strategics: RwLock::new(Vec::new()),
            tacticals: RwLock::new(Vec::new()),
            agents: DashMap::new(),
            agent_names: DashMap::new(),
            healths: DashMap::new(),
            dedupe_keys: DashMap::new(),
            lifecycle: RwLock::new(Vec::new()),
            needs: DashMap::new(),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn entity(&self) -> Result<Entity> {
        Ok(self.entity.read().clone())
    }

    async fn rename_entity(&self, name: &str) -> Result<()> {
        self.entity.write().rename(name);
        Ok(())
    }

    async fn upsert_interest(&self, interest: Interest) -> Result<()> {
        self.interests.insert(facet_key(&interest.name), interest);
        Ok(())
    }

    async fn interests(&self, active_only: bool) -> Result<Vec<Interest>> {
        Ok(self
            .interests
            .iter()
            .filter(|entry| !active_only || entry.active)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn deactivate_stale_interests(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut deactivated = 0;
        for mut entry in self.interests.iter_mut() {
            if entry.active && entry.last_reinforced < cutoff {
                entry.active = false;
                deactivated += 1;
            }
        }
        Ok(deactivated)
    }

    async fn upsert_goal(&self, goal: Goal) -> Result<()> {
        self.goals.insert(facet_key(&goal.title), goal);
        Ok(())
    }

    async fn goals(&self, active_only: bool) -> Result<Vec<Goal>> {
        Ok(self
            .goals
            .iter()
            .filter(|entry| !active_only || entry.status == GoalStatus::Active)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn upsert_value(&self, value: EntityValue) -> Result<()> {
        self.values.insert(facet_key(&value.name), value);
        Ok(())
    }

    async fn values(&self) -> Result<Vec<EntityValue>> {
        Ok(self.values.iter().map(|entry| entry.clone()).collect())
    }

    async fn profile_version(&self) -> Result<u64> {
        Ok(self.profile_version.load(Ordering::SeqCst))
    }

    async fn bump_profile_version(&self) -> Result<u64> {
        Ok(self.profile_version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn enqueue_raw(&self, item: RawDataItem) -> Result<()> {
        self.raw_queue.lock().push_back(item);
        Ok(())
    }

    async fn take_unprocessed(&self, cap: usize) -> Result<Vec<RawDataItem>> {
        let mut queue = self.raw_queue.lock();
        let take = cap.min(queue.len());
        Ok(queue.drain(..take).collect())
    }

    async fn requeue_raw(&self, items: Vec<RawDataItem>) -> Result<()> {
        let mut queue = self.raw_queue.lock();
        // Front of the queue so the next run picks the batch up again.
        for item in items.into_iter().rev() {
            queue.push_front(item);
        }
        Ok(())
    }
}

#[async_trait]
impl InterpretationStore for MemoryStore {
    async fn put_strategic(&self, record: Strategic) -> Result<()> {
        self.strategics.write().push(record);
        // A new Strategic invalidates every prior Tactical.
        for tactical in self.tacticals.write().iter_mut() {
            tactical.stale = true;
        }
        Ok(())
    }

    async fn latest_strategic(&self) -> Result<Option<Strategic>> {
        Ok(self.strategics.read().last().cloned())
    }

    async fn get_strategic(&self, id: Uuid) -> Result<Option<Strategic>> {
        Ok(self.strategics.read().iter().find(|s| s.id == id).cloned())
    }

    async fn put_tactical(&self, mut record: Tactical) -> Result<Tactical> {
        let latest = self.strategics.read().last().map(|s| s.id);
        if latest != Some(record.strategic_ref) {
            // A newer Strategic landed mid-generation; keep the work but
            // never trust it.
            record.stale = true;
        }
        self.tacticals.write().push(record.clone());
        Ok(record)
    }

    async fn latest_tactical(&self) -> Result<Option<Tactical>> {
        Ok(self
            .tacticals
            .read()
            .iter()
            .rev()
            .find(|t| !t.stale)
            .cloned())
    }

    async fn get_tactical(&self, id: Uuid) -> Result<Option<Tactical>> {
        Ok(self.tacticals.read().iter().find(|t| t.id == id).cloned())
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn create(&self, agent: Agent) -> Result<Agent> {
        if self.agent_names.contains_key(&agent.name) {
            return Err(GenosError::Storage(format!(
                "agent name already taken: {}",
                agent.name
            )));
        }
        self.agent_names.insert(agent.name.clone(), agent.id);
        self.agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Agent>> {
        Ok(self.agents.get(&id).map(|entry| entry.clone()))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Agent>> {
        match self.agent_names.get(name) {
            Some(id) => self.get(*id).await,
            None => Ok(None),
        }
    }

    async fn list(&self, status: Option<AgentStatus>) -> Result<Vec<Agent>> {
        Ok(self
            .agents
            .iter()
            .filter(|entry| status.map_or(true, |s| entry.status == s))
            .map(|entry| entry.clone())
            .collect())
    }

    async fn update(&self, mut agent: Agent, expected_version: u64) -> Result<Agent> {
        let mut entry = self
            .agents
            .get_mut(&agent.id)
            .ok_or_else(|| GenosError::NotFound(format!("agent {}", agent.id)))?;
        if entry.version != expected_version {
            return Err(GenosError::ConcurrencyConflict {
                agent_id: agent.id,
                expected: expected_version,
                found: entry.version,
            });
        }
        if agent.version <= expected_version {
            return Err(GenosError::Storage(
                "agent version must strictly increase on update".into(),
            ));
        }
        agent.updated_at = Utc::now();
        *entry = agent.clone();
        Ok(agent)
    }

    async fn set_status(&self, id: Uuid, status: AgentStatus) -> Result<Agent> {
        let mut entry = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| GenosError::NotFound(format!("agent {id}")))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn get_or_default(&self, agent_id: Uuid) -> Result<AgentHealth> {
        Ok(self
            .healths
            .get(&agent_id)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| AgentHealth::new(agent_id)))
    }

    async fn put(&self, health: AgentHealth) -> Result<()> {
        self.healths.insert(health.agent_id, health);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<AgentHealth>> {
        Ok(self.healths.iter().map(|entry| entry.clone()).collect())
    }

    async fn claim_dedupe_key(&self, key: &str) -> Result<bool> {
        let now = Utc::now();
        let cutoff = now - Duration::hours(DEDUPE_RETENTION_HOURS);
        self.dedupe_keys.retain(|_, seen_at| *seen_at > cutoff);
        Ok(self.dedupe_keys.insert(key.to_string(), now).is_none())
    }

    async fn release_dedupe_key(&self, key: &str) -> Result<()> {
        self.dedupe_keys.remove(key);
        Ok(())
    }
}

#[async_trait]
impl LifecycleLog for MemoryStore {
    async fn append(&self, event: LifecycleEvent) -> Result<()> {
        self.lifecycle.write().push(event);
        Ok(())
    }

    async fn for_agent(&self, agent_id: Uuid) -> Result<Vec<LifecycleEvent>> {
        Ok(self
            .lifecycle
            .read()
            .iter()
            .filter(|e| e.agent_id == agent_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<LifecycleEvent>> {
        Ok(self.lifecycle.read().clone())
    }
}

#[async_trait]
impl NeedStore for MemoryStore {
    async fn upsert_open(&self, need: AgentFactoryNeed) -> Result<AgentFactoryNeed> {
        // Refresh the existing open need for this kind instead of opening
        // a duplicate.
        for mut entry in self.needs.iter_mut() {
            if entry.status == NeedStatus::Open && entry.kind == need.kind {
                for evidence in &need.evidence {
                    if !entry.evidence.contains(evidence) {
                        entry.evidence.push(evidence.clone());
                    }
                }
                return Ok(entry.clone());
            }
        }
        self.needs.insert(need.id, need.clone());
        Ok(need)
    }

    async fn open_needs(&self) -> Result<Vec<AgentFactoryNeed>> {
        Ok(self
            .needs
            .iter()
            .filter(|entry| entry.status == NeedStatus::Open)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn set_spawned(&self, id: Uuid, agent_id: Uuid) -> Result<()> {
        let mut entry = self
            .needs
            .get_mut(&id)
            .ok_or_else(|| GenosError::NotFound(format!("need {id}")))?;
        entry.spawned_agent = Some(agent_id);
        Ok(())
    }

    async fn clear_spawned(&self, id: Uuid) -> Result<()> {
        let mut entry = self
            .needs
            .get_mut(&id)
            .ok_or_else(|| GenosError::NotFound(format!("need {id}")))?;
        entry.spawned_agent = None;
        Ok(())
    }

    async fn mark_addressed(&self, id: Uuid) -> Result<()> {
        let mut entry = self
            .needs
            .get_mut(&id)
            .ok_or_else(|| GenosError::NotFound(format!("need {id}")))?;
        entry.status = NeedStatus::Addressed;
        Ok(())
    }

    async fn open_need_for_agent(&self, agent_id: Uuid) -> Result<Option<AgentFactoryNeed>> {
        Ok(self
            .needs
            .iter()
            .find(|entry| {
                entry.status == NeedStatus::Open && entry.spawned_agent == Some(agent_id)
            })
            .map(|entry| entry.clone()))
    }
}
