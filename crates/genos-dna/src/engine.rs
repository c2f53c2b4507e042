//! The synthesis engine
//!
//! One cycle: take a batch of unprocessed raw items, ask the completion
//! service for a structured extraction, reconcile the result with existing
//! facets by exact name match, deactivate stale facets, bump the profile
//! version, publish `profile_updated`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use genos_bus::EventBus;
use genos_common::{
    Entity, EntityValue, Event, Goal, Interest, RawDataItem, Result, DEFAULT_BATCH_CAP,
    DEFAULT_STALENESS_DAYS, MERGE_OBSERVED_WEIGHT, MERGE_OLD_WEIGHT,
};
use genos_llm::{structured, CompletionClient, CompletionRequest, LlmError};
use genos_store::ProfileStore;

use crate::extraction::ExtractedDna;

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Maximum raw items per cycle.
    pub batch_cap: usize,
    /// Days without reinforcement before a facet is deactivated.
    pub staleness_days: i64,
    /// Weight of the existing confidence when merging.
    pub old_weight: f64,
    /// Weight of the observed confidence when merging.
    pub observed_weight: f64,
    pub completion_timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            batch_cap: DEFAULT_BATCH_CAP,
            staleness_days: DEFAULT_STALENESS_DAYS,
            old_weight: MERGE_OLD_WEIGHT,
            observed_weight: MERGE_OBSERVED_WEIGHT,
            completion_timeout: Duration::from_secs(genos_common::COMPLETION_TIMEOUT_SECS),
        }
    }
}

/// What one synthesis cycle changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDelta {
    pub new_interests: usize,
    pub reinforced_interests: usize,
    pub new_goals: usize,
    pub updated_goals: usize,
    pub new_values: usize,
    pub updated_values: usize,
    pub deactivated_interests: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No unprocessed data; nothing to do.
    Idle,
    /// The batch failed extraction (after the strict retry) and was
    /// requeued for the next run.
    BatchFailed,
    Completed {
        profile_version: u64,
        delta: ProfileDelta,
    },
}

pub struct SynthesisEngine {
    store: Arc<dyn ProfileStore>,
    bus: Arc<dyn EventBus>,
    llm: Arc<dyn CompletionClient>,
    config: SynthesisConfig,
}

impl SynthesisEngine {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        bus: Arc<dyn EventBus>,
        llm: Arc<dyn CompletionClient>,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            store,
            bus,
            llm,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let entity = self.store.entity().await?;
        let batch = self.store.take_unprocessed(self.config.batch_cap).await?;
        if batch.is_empty() {
            return Ok(CycleOutcome::Idle);
        }
        info!(items = batch.len(), entity = %entity.name, "starting synthesis cycle");

        let request = self.build_extraction_request(&entity, &batch).await?;
        let extracted: ExtractedDna =
            match structured(self.llm.as_ref(), request, self.config.completion_timeout).await {
                Ok(parsed) => parsed,
                Err(LlmError::Malformed(err)) => {
                    // Strict retry already happened inside `structured`.
                    warn!(error = %err, "extraction failed after strict retry, requeueing batch");
                    self.store.requeue_raw(batch).await?;
                    return Ok(CycleOutcome::BatchFailed);
                }
                Err(other) => {
                    self.store.requeue_raw(batch).await?;
                    return Err(other.into());
                }
            };

        let mut delta = self.reconcile(extracted).await?;

        let cutoff = Utc::now() - chrono::Duration::days(self.config.staleness_days);
        delta.deactivated_interests = self.store.deactivate_stale_interests(cutoff).await?;

        let profile_version = self.store.bump_profile_version().await?;
        self.bus
            .publish(&Event::ProfileUpdated {
                entity_id: entity.id,
                profile_version,
            })
            .await?;

        info!(
            profile_version,
            new_interests = delta.new_interests,
            reinforced = delta.reinforced_interests,
            deactivated = delta.deactivated_interests,
            "synthesis cycle complete"
        );
        Ok(CycleOutcome::Completed {
            profile_version,
            delta,
        })
    }

    async fn build_extraction_request(
        &self,
        entity: &Entity,
        batch: &[RawDataItem],
    ) -> Result<CompletionRequest> {
        let known_interests: Vec<String> = self
            .store
            .interests(true)
            .await?
            .into_iter()
            .map(|i| i.name)
            .collect();
        let known_goals: Vec<String> = self
            .store
            .goals(true)
            .await?
            .into_iter()
            .map(|g| g.title)
            .collect();

        let data_summary: String = batch
            .iter()
            .map(|item| {
                let content: String = item.content.chars().take(500).collect();
                format!("[{}] {}", item.source, content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "You are analyzing interaction data for \"{name}\" to extract their profile.\n\
             \n\
             The profile consists of:\n\
             1. Interests: topics, domains, activities they care about\n\
             2. Goals: objectives and aspirations they want to achieve\n\
             3. Values: principles and beliefs that matter to them\n\
             \n\
             Already known interests: {interests}\n\
             Already known goals: {goals}\n\
             \n\
             Recent data:\n{data}\n\
             \n\
             Extract interests, goals, and values visible in the data. Reobserving \
             something already known is useful: report it with your current confidence.\n\
             \n\
             Respond in JSON:\n\
             {{\n\
               \"interests\": [{{\"name\": \"...\", \"description\": \"...\", \"confidence\": 0.0}}],\n\
               \"goals\": [{{\"title\": \"...\", \"description\": \"...\", \"priority\": 5}}],\n\
               \"values\": [{{\"name\": \"...\", \"description\": \"...\", \"importance\": 0.0}}]\n\
             }}",
            name = entity.name,
            interests = known_interests.join(", "),
            goals = known_goals.join(", "),
            data = data_summary,
        );

        Ok(CompletionRequest::new(
            "You are a profile analyst. Extract interests, goals, and values from entity data.",
            prompt,
        ))
    }

    /// Merge extracted facets into the store. Exact name match merges by
    /// weighted average; no match creates the facet at the observed score.
    async fn reconcile(&self, extracted: ExtractedDna) -> Result<ProfileDelta> {
        let mut delta = ProfileDelta::default();

        // Inactive facets participate in matching: reinforcing one
        // reactivates it instead of creating a duplicate.
        let existing_interests = self.store.interests(false).await?;
        for observed in extracted.interests {
            let found = existing_interests
                .iter()
                .find(|i| i.name.eq_ignore_ascii_case(observed.name.trim()));
            let interest = match found {
                Some(current) => {
                    let mut merged = current.clone();
                    merged.reinforce(
                        observed.confidence,
                        self.config.old_weight,
                        self.config.observed_weight,
                    );
                    if merged.description.is_none() {
                        merged.description = observed.description;
                    }
                    delta.reinforced_interests += 1;
                    merged
                }
                None => {
                    let mut fresh = Interest::new(observed.name.trim(), observed.confidence);
                    fresh.description = observed.description;
                    delta.new_interests += 1;
                    fresh
                }
            };
            self.store.upsert_interest(interest).await?;
        }

        let existing_goals = self.store.goals(false).await?;
        for observed in extracted.goals {
            let found = existing_goals
                .iter()
                .find(|g| g.title.eq_ignore_ascii_case(observed.title.trim()));
            let goal = match found {
                Some(current) => {
                    let mut updated = current.clone();
                    updated.priority = observed.priority.clamp(1, 10);
                    if updated.description.is_none() {
                        updated.description = observed.description;
                    }
                    updated.updated_at = Utc::now();
                    delta.updated_goals += 1;
                    updated
                }
                None => {
                    let mut fresh = Goal::new(observed.title.trim(), observed.priority);
                    fresh.description = observed.description;
                    delta.new_goals += 1;
                    fresh
                }
            };
            self.store.upsert_goal(goal).await?;
        }

        let existing_values = self.store.values().await?;
        for observed in extracted.values {
            let found = existing_values
                .iter()
                .find(|v| v.name.eq_ignore_ascii_case(observed.name.trim()));
            let value = match found {
                Some(current) => {
                    let mut merged = current.clone();
                    merged.merge_importance(
                        observed.importance,
                        self.config.old_weight,
                        self.config.observed_weight,
                    );
                    delta.updated_values += 1;
                    merged
                }
                None => {
                    let mut fresh = EntityValue::new(observed.name.trim(), observed.importance);
                    fresh.description = observed.description;
                    delta.new_values += 1;
                    fresh
                }
            };
            self.store.upsert_value(value).await?;
        }

        Ok(delta)
    }
}
