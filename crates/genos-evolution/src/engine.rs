//! Lifecycle engine
//!
//! Evaluates health scores against the decision table and applies the
//! outcome: apoptosis deprecates, evolution regenerates the configuration,
//! mitosis clones. Repeated identical decisions are suppressed within a
//! short window, and mitosis is rate-limited per lineage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use genos_bus::EventBus;
use genos_common::{
    Agent, AgentStatus, Event, GenosError, LifecycleEvent, LifecycleKind, Result,
};
use genos_prompts::PromptGenerator;
use genos_store::{AgentStore, HealthStore, LifecycleLog};

use crate::policy::{decide, Decision, PolicyConfig};

/// What the engine actually did for one agent evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedDecision {
    /// Nothing to do, or the agent is not eligible.
    Held,
    /// Same decision already taken recently; suppressed.
    Deduplicated(Decision),
    Deprecated,
    Evolved,
    /// Carries the new clone's id.
    Cloned(Uuid),
}

pub struct LifecycleEngine {
    agents: Arc<dyn AgentStore>,
    healths: Arc<dyn HealthStore>,
    log: Arc<dyn LifecycleLog>,
    bus: Arc<dyn EventBus>,
    prompts: Arc<PromptGenerator>,
    policy: PolicyConfig,
    /// Last mitosis per lineage, for the cooldown.
    lineage_cooldowns: DashMap<Uuid, DateTime<Utc>>,
    /// Recent decision keys ("agent:kind:bucket") and when they fired.
    recent_decisions: DashMap<String, DateTime<Utc>>,
}

impl LifecycleEngine {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        healths: Arc<dyn HealthStore>,
        log: Arc<dyn LifecycleLog>,
        bus: Arc<dyn EventBus>,
        prompts: Arc<PromptGenerator>,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            agents,
            healths,
            log,
            bus,
            prompts,
            policy,
            lineage_cooldowns: DashMap::new(),
            recent_decisions: DashMap::new(),
        }
    }

    /// Evaluate one agent against the decision table and apply the result.
    /// Only Active agents are eligible; everything else holds.
    #[instrument(skip(self))]
    pub async fn evaluate(&self, agent_id: Uuid) -> Result<AppliedDecision> {
        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| GenosError::NotFound(format!("agent {agent_id}")))?;
        if agent.status != AgentStatus::Active {
            return Ok(AppliedDecision::Held);
        }

        let health = self.healths.get_or_default(agent_id).await?;
        let decision = decide(health.score, health.sample_count, &self.policy);
        if decision == Decision::Hold {
            return Ok(AppliedDecision::Held);
        }

        if self.recently_decided(agent_id, decision, health.score) {
            info!(%agent_id, decision = decision.kind(), "identical recent decision, suppressed");
            return Ok(AppliedDecision::Deduplicated(decision));
        }

        let applied = match decision {
            Decision::Apoptosis => self.apoptose(&agent, health.score).await?,
            Decision::Evolve => self.evolve(&agent, health.score).await?,
            Decision::Mitosis => self.mitose(&agent, health.score).await?,
            Decision::Hold => unreachable!(),
        };
        if applied != AppliedDecision::Held {
            self.record_decision(agent_id, decision, health.score);
        }
        Ok(applied)
    }

    /// Periodic pass over every active agent.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<Vec<(Uuid, AppliedDecision)>> {
        let agents = self.agents.list(Some(AgentStatus::Active)).await?;
        let mut outcomes = Vec::with_capacity(agents.len());
        for agent in agents {
            match self.evaluate(agent.id).await {
                Ok(applied) => outcomes.push((agent.id, applied)),
                Err(err) => {
                    warn!(agent_id = %agent.id, error = %err, "evaluation failed, skipping agent");
                }
            }
        }
        Ok(outcomes)
    }

    async fn apoptose(&self, agent: &Agent, score: f64) -> Result<AppliedDecision> {
        self.agents
            .set_status(agent.id, AgentStatus::Deprecated)
            .await?;
        self.log
            .append(LifecycleEvent::new(
                agent.id,
                LifecycleKind::Deprecate,
                format!("score {score:.2} below apoptosis threshold"),
                Some(score),
            ))
            .await?;
        self.bus
            .publish(&Event::AgentDeprecated { agent_id: agent.id })
            .await?;
        info!(agent_id = %agent.id, score, "agent deprecated");
        Ok(AppliedDecision::Deprecated)
    }

    async fn evolve(&self, agent: &Agent, score: f64) -> Result<AppliedDecision> {
        let report = self.prompts.regenerate_agent(agent.id).await?;
        self.log
            .append(LifecycleEvent::new(
                agent.id,
                LifecycleKind::Evolve,
                format!(
                    "score {score:.2} in evolution band, regenerated to v{}",
                    report.new_version
                ),
                Some(score),
            ))
            .await?;
        info!(agent_id = %agent.id, score, new_version = report.new_version, "agent evolved");
        Ok(AppliedDecision::Evolved)
    }

    async fn mitose(&self, agent: &Agent, score: f64) -> Result<AppliedDecision> {
        let now = Utc::now();
        if let Some(last) = self.lineage_cooldowns.get(&agent.lineage) {
            if now - *last < self.policy.mitosis_cooldown {
                let violation = GenosError::PolicyViolation(format!(
                    "lineage {} duplicated within cooldown, mitosis withheld",
                    agent.lineage
                ));
                warn!(agent_id = %agent.id, error = %violation, "mitosis held");
                return Ok(AppliedDecision::Held);
            }
        }

        let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_string();
        let clone = agent.clone_for_mitosis(format!("{}-{suffix}", agent.kind));
        let clone = self.agents.create(clone).await?;

        self.log
            .append(LifecycleEvent::new(
                agent.id,
                LifecycleKind::Duplicate,
                format!(
                    "score {score:.2} above mitosis threshold, cloned as {} to split traffic",
                    clone.name
                ),
                Some(score),
            ))
            .await?;
        self.bus
            .publish(&Event::AgentCreated { agent_id: clone.id })
            .await?;
        self.lineage_cooldowns.insert(agent.lineage, now);
        info!(agent_id = %agent.id, clone_id = %clone.id, score, "agent duplicated");
        Ok(AppliedDecision::Cloned(clone.id))
    }

    fn decision_key(&self, agent_id: Uuid, decision: Decision, score: f64) -> String {
        format!("{agent_id}:{}:{}", decision.kind(), self.policy.bucket(score))
    }

    fn recently_decided(&self, agent_id: Uuid, decision: Decision, score: f64) -> bool {
        let key = self.decision_key(agent_id, decision, score);
        match self.recent_decisions.get(&key) {
            Some(at) => Utc::now() - *at < self.policy.decision_dedupe_window,
            None => false,
        }
    }

    fn record_decision(&self, agent_id: Uuid, decision: Decision, score: f64) {
        let key = self.decision_key(agent_id, decision, score);
        self.recent_decisions.insert(key, Utc::now());
        // Keep the map from growing unbounded across long sweeps.
        let window = self.policy.decision_dedupe_window;
        self.recent_decisions
            .retain(|_, at| Utc::now() - *at < window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{HealthScorer, ScoringConfig};
    use genos_bus::MemoryBus;
    use genos_common::{ActionItem, AgentHealth, Entity, Strategic, Tactical};
    use genos_llm::ScriptedClient;
    use genos_store::{AgentStore, InterpretationStore, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        bus: Arc<MemoryBus>,
        llm: Arc<ScriptedClient>,
        engine: LifecycleEngine,
    }

    async fn fixture(responses: Vec<String>) -> Fixture {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let bus = Arc::new(MemoryBus::new());
        let llm = Arc::new(ScriptedClient::new(responses));

        let strategic = Strategic::new(vec!["wellness".into()], vec![], vec![]);
        store.put_strategic(strategic.clone()).await.unwrap();
        store
            .put_tactical(Tactical::new(
                strategic.id,
                vec![ActionItem {
                    description: "check in daily".into(),
                    rank: 1,
                }],
                vec!["wellness".into()],
                vec![],
            ))
            .await
            .unwrap();

        let prompts = Arc::new(PromptGenerator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            llm.clone(),
            Default::default(),
        ));
        let engine = LifecycleEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            bus.clone(),
            prompts,
            PolicyConfig::default(),
        );
        Fixture {
            store,
            bus,
            llm,
            engine,
        }
    }

    async fn active_agent(store: &MemoryStore, name: &str) -> Agent {
        let agent = Agent::new(name, "briefing", "daily briefings", "cfg");
        let agent = store.create(agent).await.unwrap();
        store
            .set_status(agent.id, AgentStatus::Active)
            .await
            .unwrap()
    }

    async fn put_health(store: &MemoryStore, agent_id: Uuid, score: f64, samples: u64) {
        let mut health = AgentHealth::new(agent_id);
        health.sample_count = samples;
        health.success_count = (samples as f64 * score) as u64;
        health.score = score;
        store.put(health).await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_agent_is_deprecated_with_one_audit_entry() {
        let f = fixture(vec![]).await;
        let agent = active_agent(&f.store, "briefer-1").await;
        // 2/10 success rate pushed through the scorer for a real score.
        let scorer = HealthScorer::new(f.store.clone(), f.bus.clone(), ScoringConfig::default());
        for i in 0..10 {
            scorer
                .observe(agent.id, i < 2, 200, Some(0.1), &format!("t{i}"))
                .await
                .unwrap();
        }

        let applied = f.engine.evaluate(agent.id).await.unwrap();
        assert_eq!(applied, AppliedDecision::Deprecated);

        let stored = f.store.get(agent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AgentStatus::Deprecated);

        let trail = f.store.for_agent(agent.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, LifecycleKind::Deprecate);
        assert!(trail[0].triggering_score.unwrap() < 0.3);
    }

    #[tokio::test]
    async fn test_thriving_agent_is_cloned_pending_qa() {
        let f = fixture(vec![]).await;
        let agent = active_agent(&f.store, "briefer-1").await;
        put_health(&f.store, agent.id, 0.9, 40).await;

        let applied = f.engine.evaluate(agent.id).await.unwrap();
        let clone_id = match applied {
            AppliedDecision::Cloned(id) => id,
            other => panic!("expected clone, got {other:?}"),
        };

        let clone = f.store.get(clone_id).await.unwrap().unwrap();
        assert_eq!(clone.version, 1);
        assert_eq!(clone.status, AgentStatus::PendingQa);
        assert_eq!(clone.system_config, agent.system_config);
        assert_eq!(clone.lineage, agent.lineage);
        assert_ne!(clone.name, agent.name);

        let trail = f.store.for_agent(agent.id).await.unwrap();
        assert_eq!(trail[0].kind, LifecycleKind::Duplicate);
    }

    #[tokio::test]
    async fn test_mid_band_agent_evolves_via_regeneration() {
        let f = fixture(vec![r#"{"system_config": "better cfg"}"#.into()]).await;
        let agent = active_agent(&f.store, "briefer-1").await;
        put_health(&f.store, agent.id, 0.45, 20).await;

        let applied = f.engine.evaluate(agent.id).await.unwrap();
        assert_eq!(applied, AppliedDecision::Evolved);
        assert_eq!(f.llm.requests().len(), 1);

        let updated = f.store.get(agent.id).await.unwrap().unwrap();
        assert_eq!(updated.system_config, "better cfg");
        assert_eq!(updated.version, 2);

        let trail = f.store.for_agent(agent.id).await.unwrap();
        assert_eq!(trail[0].kind, LifecycleKind::Evolve);
    }

    #[tokio::test]
    async fn test_holds_below_sample_floor() {
        let f = fixture(vec![]).await;
        let agent = active_agent(&f.store, "briefer-1").await;
        put_health(&f.store, agent.id, 0.1, 3).await;

        let applied = f.engine.evaluate(agent.id).await.unwrap();
        assert_eq!(applied, AppliedDecision::Held);
        assert!(f.store.for_agent(agent.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_decision_is_suppressed() {
        let f = fixture(vec![
            r#"{"system_config": "a"}"#.into(),
            r#"{"system_config": "b"}"#.into(),
        ])
        .await;
        let agent = active_agent(&f.store, "briefer-1").await;
        put_health(&f.store, agent.id, 0.45, 20).await;

        assert_eq!(
            f.engine.evaluate(agent.id).await.unwrap(),
            AppliedDecision::Evolved
        );
        // Same score band again inside the window: no second regeneration.
        put_health(&f.store, agent.id, 0.46, 21).await;
        assert_eq!(
            f.engine.evaluate(agent.id).await.unwrap(),
            AppliedDecision::Deduplicated(Decision::Evolve)
        );
        assert_eq!(f.llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mitosis_respects_lineage_cooldown() {
        let f = fixture(vec![]).await;
        let agent = active_agent(&f.store, "briefer-1").await;
        put_health(&f.store, agent.id, 0.9, 40).await;

        assert!(matches!(
            f.engine.evaluate(agent.id).await.unwrap(),
            AppliedDecision::Cloned(_)
        ));

        // A different score bucket dodges the decision dedupe but still
        // lands inside the lineage cooldown.
        put_health(&f.store, agent.id, 0.96, 60).await;
        assert_eq!(
            f.engine.evaluate(agent.id).await.unwrap(),
            AppliedDecision::Held
        );
        assert_eq!(f.store.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_covers_all_active_agents() {
        let f = fixture(vec![]).await;
        let bad = active_agent(&f.store, "bad-1").await;
        let good = active_agent(&f.store, "good-1").await;
        put_health(&f.store, bad.id, 0.1, 20).await;
        put_health(&f.store, good.id, 0.9, 40).await;

        let outcomes = f.engine.sweep().await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            f.store
                .get(bad.id)
                .await
                .unwrap()
                .unwrap()
                .status,
            AgentStatus::Deprecated
        );
    }
}
