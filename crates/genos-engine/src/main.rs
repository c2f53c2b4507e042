//! Genos engine binary

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genos_bus::{EventBus, MemoryBus, NatsBus};
use genos_common::Entity;
use genos_dna::SynthesisEngine;
use genos_engine::{BusMode, EngineConfig, Runtime};
use genos_evolution::{HealthScorer, LifecycleEngine};
use genos_factory::{AgentFactory, QaValidator};
use genos_interpret::{StrategicStage, StrategicStageConfig, TacticalStage, TacticalStageConfig};
use genos_llm::{CompletionClient, HttpClient};
use genos_prompts::{GeneratorConfig, PromptGenerator};
use genos_store::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::load()?;
    info!(entity = %config.entity_name, "starting genos engine");

    let bus: Arc<dyn EventBus> = match config.bus.mode {
        BusMode::Memory => Arc::new(MemoryBus::new()),
        BusMode::Nats => {
            info!(url = %config.bus.nats_url, "connecting to NATS");
            Arc::new(
                NatsBus::connect_with_prefix(&config.bus.nats_url, &config.bus.subject_prefix)
                    .await?,
            )
        }
    };

    let llm: Arc<dyn CompletionClient> = Arc::new(HttpClient::new(
        config.llm.endpoint.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));
    let store = Arc::new(MemoryStore::new(Entity::new(config.entity_name.clone())));

    let synthesis = Arc::new(SynthesisEngine::new(
        store.clone(),
        bus.clone(),
        llm.clone(),
        config.synthesis_config(),
    ));
    let strategic = Arc::new(StrategicStage::new(
        store.clone(),
        store.clone(),
        bus.clone(),
        llm.clone(),
        StrategicStageConfig::default(),
    ));
    let tactical = Arc::new(TacticalStage::new(
        store.clone(),
        bus.clone(),
        llm.clone(),
        TacticalStageConfig::default(),
    ));
    let prompts = Arc::new(PromptGenerator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        llm.clone(),
        GeneratorConfig::default(),
    ));
    let scorer = Arc::new(HealthScorer::new(
        store.clone(),
        bus.clone(),
        config.scoring_config(),
    ));
    let lifecycle = Arc::new(LifecycleEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        bus.clone(),
        prompts.clone(),
        config.policy_config(),
    ));
    let factory = Arc::new(AgentFactory::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        bus.clone(),
        llm.clone(),
        config.factory_config(),
    ));
    let validator = Arc::new(QaValidator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        bus.clone(),
        llm.clone(),
        config.qa_config(),
    ));

    let runtime = Arc::new(Runtime::new(
        synthesis,
        strategic,
        tactical,
        prompts,
        scorer,
        lifecycle,
        factory,
        validator,
        bus,
        config.worker_permits,
    ));

    let sweeps = runtime.spawn_sweeps(
        config.synthesis_interval(),
        config.policy_sweep_interval(),
        config.factory_sweep_interval(),
    );

    let loop_handle = tokio::spawn(Arc::clone(&runtime).run());
    info!("genos engine running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    loop_handle.abort();
    for sweep in sweeps {
        sweep.abort();
    }
    info!("genos engine stopped");
    Ok(())
}
