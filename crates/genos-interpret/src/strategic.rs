//! Strategic interpretation stage

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument};

use genos_bus::EventBus;
use genos_common::{Event, GenosError, Result, Strategic};
use genos_llm::{structured, CompletionClient, CompletionRequest};
use genos_store::{InterpretationStore, ProfileStore};

/// Themes to keep at most; the prompt asks for 3-5.
const MAX_THEMES: usize = 5;

#[derive(Debug, Clone)]
pub struct StrategicStageConfig {
    pub completion_timeout: Duration,
}

impl Default for StrategicStageConfig {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(genos_common::COMPLETION_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StrategicOutput {
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    opportunities: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
}

pub struct StrategicStage {
    profile: Arc<dyn ProfileStore>,
    interpretations: Arc<dyn InterpretationStore>,
    bus: Arc<dyn EventBus>,
    llm: Arc<dyn CompletionClient>,
    config: StrategicStageConfig,
}

impl StrategicStage {
    pub fn new(
        profile: Arc<dyn ProfileStore>,
        interpretations: Arc<dyn InterpretationStore>,
        bus: Arc<dyn EventBus>,
        llm: Arc<dyn CompletionClient>,
        config: StrategicStageConfig,
    ) -> Self {
        Self {
            profile,
            interpretations,
            bus,
            llm,
            config,
        }
    }

    /// Run on every `profile_updated` event.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<Strategic> {
        let entity = self.profile.entity().await?;
        let interests = self.profile.interests(true).await?;
        let goals = self.profile.goals(true).await?;
        let values = self.profile.values().await?;

        let prompt = format!(
            "You are interpreting the profile of \"{name}\" to identify strategic direction.\n\
             \n\
             Interests: {interests}\n\
             Goals: {goals}\n\
             Values: {values}\n\
             \n\
             Identify 3-5 cross-cutting themes that connect these, plus the \
             opportunities they open and the risks they carry.\n\
             \n\
             Respond in JSON:\n\
             {{\"themes\": [\"...\"], \"opportunities\": [\"...\"], \"risks\": [\"...\"]}}",
            name = entity.name,
            interests = interests
                .iter()
                .map(|i| format!("{} ({:.2})", i.name, i.confidence))
                .collect::<Vec<_>>()
                .join(", "),
            goals = goals
                .iter()
                .map(|g| format!("{} (priority {})", g.title, g.priority))
                .collect::<Vec<_>>()
                .join(", "),
            values = values
                .iter()
                .map(|v| v.name.clone())
                .collect::<Vec<_>>()
                .join(", "),
        );

        let request = CompletionRequest::new(
            "You are a strategic analyst reading an entity profile.",
            prompt,
        );
        let mut output: StrategicOutput =
            structured(self.llm.as_ref(), request, self.config.completion_timeout)
                .await
                .map_err(GenosError::from)?;
        if output.themes.is_empty() {
            return Err(GenosError::MalformedModelOutput(
                "strategic interpretation returned no themes".into(),
            ));
        }
        output.themes.truncate(MAX_THEMES);

        let record = Strategic::new(output.themes, output.opportunities, output.risks);
        self.interpretations.put_strategic(record.clone()).await?;
        self.bus
            .publish(&Event::StrategicReady {
                strategic_id: record.id,
            })
            .await?;

        info!(strategic_id = %record.id, themes = record.themes.len(), "strategic interpretation ready");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use genos_bus::MemoryBus;
    use genos_common::{Entity, Goal, Interest};
    use genos_llm::ScriptedClient;
    use genos_store::MemoryStore;

    #[tokio::test]
    async fn test_strategic_stage_writes_record_and_emits_event() {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        store
            .upsert_interest(Interest::new("endurance sport", 0.8))
            .await
            .unwrap();
        store
            .upsert_goal(Goal::new("finish an ultra", 8))
            .await
            .unwrap();

        let bus = Arc::new(MemoryBus::new());
        let llm = Arc::new(ScriptedClient::new(vec![r#"{
            "themes": ["performance under endurance", "recovery discipline"],
            "opportunities": ["structured training"],
            "risks": ["overtraining"]
        }"#
        .into()]));

        let stage = StrategicStage::new(
            store.clone(),
            store.clone(),
            bus.clone(),
            llm,
            StrategicStageConfig::default(),
        );
        let mut events = bus.subscribe().await.unwrap();

        let record = stage.run().await.unwrap();
        assert_eq!(record.themes.len(), 2);
        assert_eq!(
            store.latest_strategic().await.unwrap().unwrap().id,
            record.id
        );
        match events.next().await.unwrap() {
            Event::StrategicReady { strategic_id } => assert_eq!(strategic_id, record.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_themes_is_malformed() {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let bus = Arc::new(MemoryBus::new());
        // Parses fine both times but carries no themes.
        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"themes": []}"#.into(),
            r#"{"themes": []}"#.into(),
        ]));
        let stage = StrategicStage::new(
            store.clone(),
            store,
            bus,
            llm,
            StrategicStageConfig::default(),
        );
        let err = stage.run().await.unwrap_err();
        assert!(matches!(err, GenosError::MalformedModelOutput(_)));
    }
}
