//! Capability gap detection and agent spawning

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use genos_bus::EventBus;
use genos_common::{
    Agent, AgentFactoryNeed, AgentStatus, Event, LifecycleEvent, LifecycleKind, Result,
    COMPLETION_TIMEOUT_SECS,
};
use genos_llm::{structured, CompletionClient, CompletionRequest};
use genos_store::{AgentStore, InterpretationStore, LifecycleLog, NeedStore, ProfileStore};

#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// How long a theme must stay uncovered before an agent is spawned
    /// for it. Needs are recorded immediately; spawning waits.
    pub gap_window: Duration,
    pub completion_timeout: StdDuration,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            gap_window: Duration::hours(24),
            completion_timeout: StdDuration::from_secs(COMPLETION_TIMEOUT_SECS),
        }
    }
}

/// Outcome of one factory sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Needs created or refreshed this sweep.
    pub open_gaps: Vec<String>,
    /// Agents spawned for needs past the gap window.
    pub spawned: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct GeneratedAgentSpec {
    purpose: String,
    system_config: String,
    #[serde(default)]
    tool_grants: Vec<String>,
}

pub struct AgentFactory {
    profile: Arc<dyn ProfileStore>,
    interpretations: Arc<dyn InterpretationStore>,
    agents: Arc<dyn AgentStore>,
    needs: Arc<dyn NeedStore>,
    log: Arc<dyn LifecycleLog>,
    bus: Arc<dyn EventBus>,
    llm: Arc<dyn CompletionClient>,
    config: FactoryConfig,
}

impl AgentFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profile: Arc<dyn ProfileStore>,
        interpretations: Arc<dyn InterpretationStore>,
        agents: Arc<dyn AgentStore>,
        needs: Arc<dyn NeedStore>,
        log: Arc<dyn LifecycleLog>,
        bus: Arc<dyn EventBus>,
        llm: Arc<dyn CompletionClient>,
        config: FactoryConfig,
    ) -> Self {
        Self {
            profile,
            interpretations,
            agents,
            needs,
            log,
            bus,
            llm,
            config,
        }
    }

    /// One periodic pass: record uncovered themes as needs, then spawn an
    /// agent for every open need that has aged past the gap window.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let covered: Vec<String> = self
            .agents
            .list(None)
            .await?
            .into_iter()
            .filter(|a| a.status != AgentStatus::Deprecated)
            .map(|a| a.kind.to_lowercase())
            .collect();

        for (kind, evidence) in self.candidate_kinds().await? {
            if covered.contains(&kind) {
                continue;
            }
            let need = AgentFactoryNeed::new(
                kind.clone(),
                format!("no agent covers \"{kind}\""),
            )
            .with_evidence(evidence);
            self.needs.upsert_open(need).await?;
            report.open_gaps.push(kind);
        }

        let cutoff = Utc::now() - self.config.gap_window;
        for need in self.needs.open_needs().await? {
            if let Some(agent_id) = need.spawned_agent {
                let still_covering = match self.agents.get(agent_id).await? {
                    Some(agent) => agent.status != AgentStatus::Deprecated,
                    None => false,
                };
                if still_covering {
                    continue;
                }
                // The spawn failed validation; reopen the gap so a fresh
                // configuration can be attempted.
                self.needs.clear_spawned(need.id).await?;
            }
            if need.detected_at > cutoff {
                continue;
            }
            match self.spawn_for(&need).await {
                Ok(agent_id) => report.spawned.push(agent_id),
                Err(err) => {
                    warn!(kind = %need.kind, error = %err, "spawn failed, need stays open");
                }
            }
        }
        Ok(report)
    }

    /// Theme and goal kinds the deployment should have an agent for,
    /// paired with the evidence that raised them.
    async fn candidate_kinds(&self) -> Result<Vec<(String, Vec<String>)>> {
        let mut candidates: Vec<(String, Vec<String>)> = Vec::new();
        let push = |kind: String, evidence: String, out: &mut Vec<(String, Vec<String>)>| {
            match out.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, seen)) => seen.push(evidence),
                None => out.push((kind, vec![evidence])),
            }
        };
        if let Some(strategic) = self.interpretations.latest_strategic().await? {
            for theme in &strategic.themes {
                push(
                    normalize_kind(theme),
                    format!("strategic theme: {theme}"),
                    &mut candidates,
                );
            }
        }
        for goal in self.profile.goals(true).await? {
            push(
                normalize_kind(&goal.title),
                format!("active goal: {}", goal.title),
                &mut candidates,
            );
        }
        Ok(candidates)
    }

    async fn spawn_for(&self, need: &AgentFactoryNeed) -> Result<Uuid> {
        let entity = self.profile.entity().await?;
        let prompt = format!(
            "Design a new specialized agent for \"{name}\".\n\
             \n\
             Capability gap: {description}\n\
             Evidence:\n{evidence}\n\
             \n\
             Write the agent's core purpose (one sentence) and an initial \
             system configuration (2-3 paragraphs) for an agent of kind \
             \"{kind}\". Suggest tool grants only if clearly needed.\n\
             \n\
             Respond in JSON:\n\
             {{\"purpose\": \"...\", \"system_config\": \"...\", \"tool_grants\": [\"...\"]}}",
            name = entity.name,
            description = need.description,
            evidence = need
                .evidence
                .iter()
                .map(|e| format!("- {e}"))
                .collect::<Vec<_>>()
                .join("\n"),
            kind = need.kind,
        );
        let request = CompletionRequest::new(
            "You are an agent designer for a personal AI system.",
            prompt,
        );
        let spec: GeneratedAgentSpec =
            structured(self.llm.as_ref(), request, self.config.completion_timeout).await?;

        let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_string();
        let agent = Agent::new(
            format!("{}-{suffix}", need.kind),
            need.kind.clone(),
            spec.purpose,
            spec.system_config,
        )
        .with_tool_grants(spec.tool_grants);
        let agent = self.agents.create(agent).await?;

        self.needs.set_spawned(need.id, agent.id).await?;
        self.log
            .append(LifecycleEvent::new(
                agent.id,
                LifecycleKind::Spawn,
                format!("spawned to cover capability gap \"{}\"", need.kind),
                None,
            ))
            .await?;
        self.bus
            .publish(&Event::AgentCreated { agent_id: agent.id })
            .await?;
        info!(agent_id = %agent.id, kind = %agent.kind, "agent spawned for gap");
        Ok(agent.id)
    }
}

/// Theme/goal text to agent-kind form: lowercase, hyphen-separated.
fn normalize_kind(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use genos_bus::MemoryBus;
    use genos_common::{Entity, Goal, NeedStatus, Strategic};
    use genos_llm::ScriptedClient;
    use genos_store::MemoryStore;

    fn factory(
        store: Arc<MemoryStore>,
        llm: Arc<ScriptedClient>,
        config: FactoryConfig,
    ) -> AgentFactory {
        AgentFactory::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(MemoryBus::new()),
            llm,
            config,
        )
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        store
            .put_strategic(Strategic::new(
                vec!["Marathon Training".into()],
                vec![],
                vec![],
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_uncovered_theme_opens_a_need() {
        let store = seeded_store().await;
        let factory = factory(
            store.clone(),
            Arc::new(ScriptedClient::new(vec![])),
            FactoryConfig::default(),
        );

        let report = factory.sweep().await.unwrap();
        assert_eq!(report.open_gaps, vec!["marathon-training"]);
        // Inside the gap window: recorded but not yet spawned.
        assert!(report.spawned.is_empty());

        let needs = store.open_needs().await.unwrap();
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].kind, "marathon-training");
        assert_eq!(needs[0].status, NeedStatus::Open);
    }

    #[tokio::test]
    async fn test_covered_theme_opens_nothing() {
        let store = seeded_store().await;
        let agent = Agent::new("coach", "marathon-training", "coach marathons", "cfg");
        let agent = store.create(agent).await.unwrap();
        store
            .set_status(agent.id, AgentStatus::Active)
            .await
            .unwrap();

        let factory = factory(
            store.clone(),
            Arc::new(ScriptedClient::new(vec![])),
            FactoryConfig::default(),
        );
        let report = factory.sweep().await.unwrap();
        assert!(report.open_gaps.is_empty());
        assert!(store.open_needs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_aged_need_spawns_pending_qa_agent() {
        let store = seeded_store().await;
        store.upsert_goal(Goal::new("Sleep Better", 5)).await.unwrap();
        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"purpose": "improve sleep", "system_config": "You coach sleep.", "tool_grants": []}"#.into(),
            r#"{"purpose": "train marathons", "system_config": "You coach running.", "tool_grants": []}"#.into(),
        ]));
        // Zero gap window: needs spawn on the same sweep that records them.
        let factory = factory(
            store.clone(),
            llm,
            FactoryConfig {
                gap_window: Duration::zero(),
                ..FactoryConfig::default()
            },
        );

        let report = factory.sweep().await.unwrap();
        assert_eq!(report.spawned.len(), 2);

        let spawned = store.get(report.spawned[0]).await.unwrap().unwrap();
        assert_eq!(spawned.status, AgentStatus::PendingQa);
        assert_eq!(spawned.version, 1);

        // Needs now point at their agents and stay open until validation.
        for need in store.open_needs().await.unwrap() {
            assert!(need.spawned_agent.is_some());
        }
        // Audit trail carries the spawn.
        let trail = store.for_agent(spawned.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, LifecycleKind::Spawn);
    }

    #[tokio::test]
    async fn test_spawned_need_is_not_respawned() {
        let store = seeded_store().await;
        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"purpose": "p", "system_config": "c", "tool_grants": []}"#.into(),
        ]));
        let factory = factory(
            store.clone(),
            llm,
            FactoryConfig {
                gap_window: Duration::zero(),
                ..FactoryConfig::default()
            },
        );

        let first = factory.sweep().await.unwrap();
        assert_eq!(first.spawned.len(), 1);
        // Second sweep: the theme is covered by the PendingQa agent and the
        // need already has its spawn.
        let second = factory.sweep().await.unwrap();
        assert!(second.spawned.is_empty());
        assert_eq!(store.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_need_respawns_after_spawned_agent_is_deprecated() {
        let store = seeded_store().await;
        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"purpose": "p", "system_config": "first cut", "tool_grants": []}"#.into(),
        ]));
        let factory = factory(
            store.clone(),
            llm.clone(),
            FactoryConfig {
                gap_window: Duration::zero(),
                ..FactoryConfig::default()
            },
        );

        let first = factory.sweep().await.unwrap();
        assert_eq!(first.spawned.len(), 1);
        // Validation rejects the spawn.
        store
            .set_status(first.spawned[0], AgentStatus::Deprecated)
            .await
            .unwrap();

        llm.push_response(
            r#"{"purpose": "p", "system_config": "second cut", "tool_grants": []}"#,
        );
        let second = factory.sweep().await.unwrap();
        assert_eq!(second.spawned.len(), 1);
        assert_ne!(second.spawned[0], first.spawned[0]);

        // The need now points at the fresh agent and stays open.
        let needs = store.open_needs().await.unwrap();
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].spawned_agent, Some(second.spawned[0]));
    }

    #[test]
    fn test_normalize_kind() {
        assert_eq!(normalize_kind("  Marathon Training "), "marathon-training");
        assert_eq!(normalize_kind("sleep"), "sleep");
    }
}
