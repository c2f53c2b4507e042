//! Configuration regeneration

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use genos_common::{Agent, AgentStatus, GenosError, Result, Tactical};
use genos_llm::{structured, CompletionClient, CompletionRequest};
use genos_store::{AgentStore, InterpretationStore, ProfileStore};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub completion_timeout: Duration,
    /// Attempts per agent before a concurrency conflict is given up on.
    pub max_attempts: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(genos_common::COMPLETION_TIMEOUT_SECS),
            max_attempts: 3,
        }
    }
}

/// How risky the configuration change is. Tool grants changing is a major
/// change and sends the agent back through QA; a prompt-only rewrite
/// activates immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    PromptOnly,
    Major,
}

#[derive(Debug, Clone)]
pub struct RegenerationReport {
    pub agent_id: Uuid,
    pub new_version: u64,
    pub change: ChangeClass,
}

#[derive(Debug, Deserialize)]
struct GeneratedConfig {
    system_config: String,
    #[serde(default)]
    tool_grants: Option<Vec<String>>,
}

pub struct PromptGenerator {
    profile: Arc<dyn ProfileStore>,
    interpretations: Arc<dyn InterpretationStore>,
    agents: Arc<dyn AgentStore>,
    llm: Arc<dyn CompletionClient>,
    config: GeneratorConfig,
}

impl PromptGenerator {
    pub fn new(
        profile: Arc<dyn ProfileStore>,
        interpretations: Arc<dyn InterpretationStore>,
        agents: Arc<dyn AgentStore>,
        llm: Arc<dyn CompletionClient>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            profile,
            interpretations,
            agents,
            llm,
            config,
        }
    }

    /// Run on every `tactical_ready` event: regenerate every active agent.
    /// One agent's failure never blocks the others.
    #[instrument(skip(self))]
    pub async fn regenerate_all(&self) -> Result<Vec<RegenerationReport>> {
        let agents = self.agents.list(Some(AgentStatus::Active)).await?;
        let mut reports = Vec::with_capacity(agents.len());
        for agent in agents {
            match self.regenerate_agent(agent.id).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(agent_id = %agent.id, error = %err, "regeneration failed, skipping agent");
                }
            }
        }
        Ok(reports)
    }

    /// Regenerate a single agent (also the evolution path).
    #[instrument(skip(self))]
    pub async fn regenerate_agent(&self, agent_id: Uuid) -> Result<RegenerationReport> {
        let tactical = self
            .interpretations
            .latest_tactical()
            .await?
            .ok_or_else(|| GenosError::NotFound("no non-stale tactical plan".into()))?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            // Fresh read every attempt; a conflict means our data was stale.
            let agent = self
                .agents
                .get(agent_id)
                .await?
                .ok_or_else(|| GenosError::NotFound(format!("agent {agent_id}")))?;
            if agent.status == AgentStatus::Deprecated {
                return Err(GenosError::PolicyViolation(format!(
                    "agent {agent_id} is deprecated, not regenerating"
                )));
            }

            let request = self.build_request(&agent, &tactical).await?;
            let generated: GeneratedConfig =
                structured(self.llm.as_ref(), request, self.config.completion_timeout)
                    .await
                    .map_err(GenosError::from)?;

            let expected_version = agent.version;
            let mut updated = agent;
            let change = match &generated.tool_grants {
                Some(grants) if *grants != updated.tool_grants => ChangeClass::Major,
                _ => ChangeClass::PromptOnly,
            };
            updated.system_config = generated.system_config;
            if let Some(grants) = generated.tool_grants {
                updated.tool_grants = grants;
            }
            if change == ChangeClass::Major {
                // Higher-risk change class re-enters QA before traffic.
                updated.status = AgentStatus::PendingQa;
            }
            updated.version = expected_version + 1;

            match self.agents.update(updated, expected_version).await {
                Ok(saved) => {
                    info!(
                        agent_id = %saved.id,
                        version = saved.version,
                        change = ?change,
                        "agent configuration regenerated"
                    );
                    return Ok(RegenerationReport {
                        agent_id: saved.id,
                        new_version: saved.version,
                        change,
                    });
                }
                Err(GenosError::ConcurrencyConflict { .. }) if attempt < self.config.max_attempts => {
                    warn!(agent_id = %agent_id, attempt, "concurrent write detected, retrying with fresh data");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn build_request(&self, agent: &Agent, tactical: &Tactical) -> Result<CompletionRequest> {
        let entity = self.profile.entity().await?;
        let interests: Vec<String> = self
            .profile
            .interests(true)
            .await?
            .into_iter()
            .map(|i| i.name)
            .collect();
        let goals: Vec<String> = self
            .profile
            .goals(true)
            .await?
            .into_iter()
            .map(|g| g.title)
            .collect();
        let values: Vec<String> = self
            .profile
            .values()
            .await?
            .into_iter()
            .map(|v| v.name)
            .collect();

        let plan: Vec<String> = tactical
            .action_items
            .iter()
            .map(|a| format!("{}. {}", a.rank, a.description))
            .collect();

        let prompt = format!(
            "You are rewriting the system configuration of an agent serving \"{name}\".\n\
             \n\
             Entity profile:\n\
             - Interests: {interests}\n\
             - Goals: {goals}\n\
             - Values: {values}\n\
             \n\
             Current tactical plan:\n{plan}\n\
             Priority areas: {priorities}\n\
             \n\
             Agent to customize:\n\
             - Name: {agent_name}\n\
             - Kind: {kind}\n\
             - Core purpose (MUST be preserved verbatim in spirit): {purpose}\n\
             - Current configuration: {current}\n\
             - Current tool grants: {grants}\n\
             \n\
             Write a new system configuration (2-3 paragraphs) aligned with the \
             profile and the tactical plan while keeping the agent's core purpose. \
             Only suggest different tool_grants if the plan genuinely requires it.\n\
             \n\
             Respond in JSON:\n\
             {{\"system_config\": \"...\", \"tool_grants\": [\"...\"] }}",
            name = entity.name,
            interests = interests.join(", "),
            goals = goals.join(", "),
            values = values.join(", "),
            plan = plan.join("\n"),
            priorities = tactical.priority_areas.join(", "),
            agent_name = agent.name,
            kind = agent.kind,
            purpose = agent.purpose,
            current = agent.system_config.chars().take(400).collect::<String>(),
            grants = agent.tool_grants.join(", "),
        );

        Ok(CompletionRequest::new(
            "You are a prompt engineer customizing worker agents.",
            prompt,
        ))
    }
}
