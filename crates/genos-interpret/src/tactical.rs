//! Tactical interpretation stage

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use genos_bus::EventBus;
use genos_common::{ActionItem, Event, GenosError, Result, Tactical};
use genos_llm::{structured, CompletionClient, CompletionRequest};
use genos_store::InterpretationStore;

/// Ranked action items to keep at most; the prompt asks for 5-10.
const MAX_ACTION_ITEMS: usize = 10;

/// Exactly this many priority areas survive.
const PRIORITY_AREAS: usize = 3;

#[derive(Debug, Clone)]
pub struct TacticalStageConfig {
    pub completion_timeout: Duration,
}

impl Default for TacticalStageConfig {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(genos_common::COMPLETION_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TacticalOutput {
    #[serde(default)]
    action_items: Vec<String>,
    #[serde(default)]
    priority_areas: Vec<String>,
    #[serde(default)]
    success_metrics: Vec<String>,
}

pub struct TacticalStage {
    interpretations: Arc<dyn InterpretationStore>,
    bus: Arc<dyn EventBus>,
    llm: Arc<dyn CompletionClient>,
    config: TacticalStageConfig,
}

impl TacticalStage {
    pub fn new(
        interpretations: Arc<dyn InterpretationStore>,
        bus: Arc<dyn EventBus>,
        llm: Arc<dyn CompletionClient>,
        config: TacticalStageConfig,
    ) -> Self {
        Self {
            interpretations,
            bus,
            llm,
            config,
        }
    }

    /// Run on every `strategic_ready` event. Always generates against the
    /// most recent Strategic record at start time; if a newer one lands
    /// mid-generation the result is written already flagged stale.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<Tactical> {
        let strategic = self
            .interpretations
            .latest_strategic()
            .await?
            .ok_or_else(|| GenosError::NotFound("no strategic record to refine".into()))?;

        let prompt = format!(
            "You are turning a strategic interpretation into a tactical plan.\n\
             \n\
             Themes: {themes}\n\
             Opportunities: {opportunities}\n\
             Risks: {risks}\n\
             \n\
             Produce 5-10 concrete action items ranked by impact (most impactful \
             first), the top 3 priority areas, and measurable success criteria.\n\
             \n\
             Respond in JSON:\n\
             {{\"action_items\": [\"...\"], \"priority_areas\": [\"...\"], \"success_metrics\": [\"...\"]}}",
            themes = strategic.themes.join(", "),
            opportunities = strategic.opportunities.join(", "),
            risks = strategic.risks.join(", "),
        );

        let request = CompletionRequest::new(
            "You are a tactical planner refining strategic themes into actions.",
            prompt,
        );
        let mut output: TacticalOutput =
            structured(self.llm.as_ref(), request, self.config.completion_timeout)
                .await
                .map_err(GenosError::from)?;
        if output.action_items.is_empty() {
            return Err(GenosError::MalformedModelOutput(
                "tactical interpretation returned no action items".into(),
            ));
        }
        output.action_items.truncate(MAX_ACTION_ITEMS);
        output.priority_areas.truncate(PRIORITY_AREAS);

        let action_items = output
            .action_items
            .into_iter()
            .enumerate()
            .map(|(idx, description)| ActionItem {
                description,
                rank: (idx + 1) as u8,
            })
            .collect();

        let record = Tactical::new(
            strategic.id,
            action_items,
            output.priority_areas,
            output.success_metrics,
        );
        let written = self.interpretations.put_tactical(record).await?;
        if written.stale {
            warn!(tactical_id = %written.id, "tactical plan superseded mid-generation, flagged stale");
        }

        self.bus
            .publish(&Event::TacticalReady {
                tactical_id: written.id,
            })
            .await?;
        info!(
            tactical_id = %written.id,
            strategic_ref = %written.strategic_ref,
            stale = written.stale,
            "tactical interpretation ready"
        );
        Ok(written)
    }
}
