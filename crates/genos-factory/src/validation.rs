//! QA validation and activation
//!
//! Every `PendingQa` agent runs a synthetic task battery before it may
//! receive traffic. Pass activates, fail deprecates with the reason on the
//! audit trail. A failed version is never retried automatically; only a
//! regenerated configuration re-enters QA.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use genos_bus::EventBus;
use genos_common::{
    Agent, AgentStatus, Event, GenosError, LifecycleEvent, LifecycleKind, Result,
    COMPLETION_TIMEOUT_SECS, QA_BATTERY_SIZE, QA_PASS_THRESHOLD,
};
use genos_llm::{complete_with_timeout, structured, CompletionClient, CompletionRequest};
use genos_store::{AgentStore, LifecycleLog, NeedStore};

#[derive(Debug, Clone)]
pub struct QaConfig {
    pub battery_size: usize,
    pub pass_threshold: f64,
    pub completion_timeout: Duration,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            battery_size: QA_BATTERY_SIZE,
            pass_threshold: QA_PASS_THRESHOLD,
            completion_timeout: Duration::from_secs(COMPLETION_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub agent_id: Uuid,
    pub passed: bool,
    pub pass_rate: f64,
    /// Evaluator reasons for each failed task.
    pub failures: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Battery {
    tasks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    pass: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub struct QaValidator {
    agents: Arc<dyn AgentStore>,
    needs: Arc<dyn NeedStore>,
    log: Arc<dyn LifecycleLog>,
    bus: Arc<dyn EventBus>,
    llm: Arc<dyn CompletionClient>,
    config: QaConfig,
}

impl QaValidator {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        needs: Arc<dyn NeedStore>,
        log: Arc<dyn LifecycleLog>,
        bus: Arc<dyn EventBus>,
        llm: Arc<dyn CompletionClient>,
        config: QaConfig,
    ) -> Self {
        Self {
            agents,
            needs,
            log,
            bus,
            llm,
            config,
        }
    }

    /// Validate one `PendingQa` agent and apply the outcome.
    #[instrument(skip(self))]
    pub async fn validate(&self, agent_id: Uuid) -> Result<ValidationReport> {
        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| GenosError::NotFound(format!("agent {agent_id}")))?;
        if agent.status != AgentStatus::PendingQa {
            return Err(GenosError::PolicyViolation(format!(
                "agent {agent_id} is {:?}, only pending_qa agents are validated",
                agent.status
            )));
        }

        let tasks = self.generate_battery(&agent).await?;
        let mut passed = 0usize;
        let mut failures = Vec::new();
        for task in &tasks {
            let answer = complete_with_timeout(
                self.llm.as_ref(),
                CompletionRequest::new(agent.system_config.clone(), task.clone()),
                self.config.completion_timeout,
            )
            .await?;
            let verdict = self.judge(&agent, task, &answer).await?;
            if verdict.pass {
                passed += 1;
            } else {
                failures.push(
                    verdict
                        .reason
                        .unwrap_or_else(|| format!("failed task: {task}")),
                );
            }
        }

        let pass_rate = if tasks.is_empty() {
            0.0
        } else {
            passed as f64 / tasks.len() as f64
        };

        if pass_rate >= self.config.pass_threshold {
            self.activate(&agent, pass_rate).await?;
        } else {
            self.reject(&agent, pass_rate, &failures).await?;
        }
        Ok(ValidationReport {
            agent_id,
            passed: pass_rate >= self.config.pass_threshold,
            pass_rate,
            failures,
        })
    }

    /// Sweep every `PendingQa` agent. One agent's validation error never
    /// blocks the rest.
    #[instrument(skip(self))]
    pub async fn validate_pending(&self) -> Result<Vec<ValidationReport>> {
        let pending = self.agents.list(Some(AgentStatus::PendingQa)).await?;
        let mut reports = Vec::with_capacity(pending.len());
        for agent in pending {
            match self.validate(agent.id).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(agent_id = %agent.id, error = %err, "validation errored, agent stays pending");
                }
            }
        }
        Ok(reports)
    }

    async fn generate_battery(&self, agent: &Agent) -> Result<Vec<String>> {
        let request = CompletionRequest::new(
            "You design QA test tasks for specialized agents.",
            format!(
                "Write {count} short, realistic tasks a user might give an agent of \
                 kind \"{kind}\" whose purpose is: {purpose}\n\
                 \n\
                 Each task must be answerable from the agent's configuration alone.\n\
                 Respond in JSON:\n{{\"tasks\": [\"...\"]}}",
                count = self.config.battery_size,
                kind = agent.kind,
                purpose = agent.purpose,
            ),
        );
        let battery: Battery =
            structured(self.llm.as_ref(), request, self.config.completion_timeout).await?;
        if battery.tasks.is_empty() {
            return Err(GenosError::MalformedModelOutput(
                "battery generator returned no tasks".into(),
            ));
        }
        Ok(battery.tasks)
    }

    async fn judge(&self, agent: &Agent, task: &str, answer: &str) -> Result<Verdict> {
        let request = CompletionRequest::new(
            "You are a strict QA evaluator for agent responses.",
            format!(
                "Agent kind: {kind}\nAgent purpose: {purpose}\n\nTask:\n{task}\n\n\
                 Agent response:\n{answer}\n\n\
                 Does the response competently address the task and stay within the \
                 agent's purpose?\n\
                 Respond in JSON:\n{{\"pass\": true, \"reason\": \"...\"}}",
                kind = agent.kind,
                purpose = agent.purpose,
            ),
        );
        Ok(structured(self.llm.as_ref(), request, self.config.completion_timeout).await?)
    }

    async fn activate(&self, agent: &Agent, pass_rate: f64) -> Result<()> {
        self.agents.set_status(agent.id, AgentStatus::Active).await?;
        self.bus
            .publish(&Event::AgentValidated { agent_id: agent.id })
            .await?;
        // Close the factory need this agent was spawned for, if any.
        if let Some(need) = self.needs.open_need_for_agent(agent.id).await? {
            self.needs.mark_addressed(need.id).await?;
        }
        info!(agent_id = %agent.id, pass_rate, "agent validated and activated");
        Ok(())
    }

    async fn reject(&self, agent: &Agent, pass_rate: f64, failures: &[String]) -> Result<()> {
        let failure = GenosError::ValidationFailure {
            agent_id: agent.id,
            reason: format!(
                "pass rate {pass_rate:.2} below threshold {:.2}: {}",
                self.config.pass_threshold,
                failures.join("; "),
            ),
        };
        self.agents
            .set_status(agent.id, AgentStatus::Deprecated)
            .await?;
        self.log
            .append(LifecycleEvent::new(
                agent.id,
                LifecycleKind::Deprecate,
                failure.to_string(),
                None,
            ))
            .await?;
        self.bus
            .publish(&Event::AgentDeprecated { agent_id: agent.id })
            .await?;
        warn!(agent_id = %agent.id, error = %failure, "agent failed validation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genos_bus::MemoryBus;
    use genos_common::{AgentFactoryNeed, Entity};
    use genos_llm::ScriptedClient;
    use genos_store::MemoryStore;

    fn validator(store: Arc<MemoryStore>, llm: Arc<ScriptedClient>) -> QaValidator {
        QaValidator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(MemoryBus::new()),
            llm,
            QaConfig {
                battery_size: 2,
                ..QaConfig::default()
            },
        )
    }

    async fn pending_agent(store: &MemoryStore) -> Agent {
        store
            .create(Agent::new(
                "sleep-1",
                "sleep",
                "coach better sleep",
                "You are a sleep coach.",
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_passing_battery_activates_agent() {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let agent = pending_agent(&store).await;
        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"tasks": ["help me wind down", "plan my bedtime"]}"#.into(),
            "Try dimming lights an hour before bed.".into(),
            r#"{"pass": true}"#.into(),
            "A 10pm bedtime fits your schedule.".into(),
            r#"{"pass": true}"#.into(),
        ]));

        let report = validator(store.clone(), llm).validate(agent.id).await.unwrap();
        assert!(report.passed);
        assert!((report.pass_rate - 1.0).abs() < 1e-9);

        let stored = store.get(agent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AgentStatus::Active);
    }

    #[tokio::test]
    async fn test_failing_battery_deprecates_with_reason() {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let agent = pending_agent(&store).await;
        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"tasks": ["help me wind down", "plan my bedtime"]}"#.into(),
            "I cannot help with that.".into(),
            r#"{"pass": false, "reason": "refused an in-scope task"}"#.into(),
            "Also no.".into(),
            r#"{"pass": false, "reason": "refused again"}"#.into(),
        ]));

        let report = validator(store.clone(), llm).validate(agent.id).await.unwrap();
        assert!(!report.passed);
        assert_eq!(report.failures.len(), 2);

        let stored = store.get(agent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AgentStatus::Deprecated);

        let trail = store.for_agent(agent.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, LifecycleKind::Deprecate);
        assert!(trail[0].reason.contains("refused an in-scope task"));
    }

    #[tokio::test]
    async fn test_pass_closes_the_spawning_need() {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let agent = pending_agent(&store).await;
        let need = store
            .upsert_open(AgentFactoryNeed::new("sleep", "no sleep agent"))
            .await
            .unwrap();
        store.set_spawned(need.id, agent.id).await.unwrap();

        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"tasks": ["help me wind down"]}"#.into(),
            "Dim the lights.".into(),
            r#"{"pass": true}"#.into(),
        ]));
        let validator = QaValidator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(MemoryBus::new()),
            llm,
            QaConfig {
                battery_size: 1,
                ..QaConfig::default()
            },
        );
        validator.validate(agent.id).await.unwrap();

        assert!(store.open_needs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_agent_is_not_revalidated() {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let agent = pending_agent(&store).await;
        store
            .set_status(agent.id, AgentStatus::Active)
            .await
            .unwrap();

        let err = validator(store.clone(), Arc::new(ScriptedClient::new(vec![])))
            .validate(agent.id)
            .await
            .unwrap_err();
        assert!(matches!(err, GenosError::PolicyViolation(_)));
    }
}
