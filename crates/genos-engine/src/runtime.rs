//! Event wiring
//!
//! One subscriber loop feeds every component. Each event is handled in its
//! own task, gated by the owning component's semaphore, so a slow model
//! call for one agent never stalls the loop or another component. Handler
//! errors are logged and dropped; the loop itself only ends with the bus.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use genos_bus::EventBus;
use genos_common::{retry::with_backoff, Event, Result};
use genos_dna::SynthesisEngine;
use genos_evolution::{HealthScorer, LifecycleEngine};
use genos_factory::{AgentFactory, QaValidator};
use genos_interpret::{StrategicStage, TacticalStage};
use genos_prompts::PromptGenerator;

pub struct Runtime {
    pub synthesis: Arc<SynthesisEngine>,
    pub strategic: Arc<StrategicStage>,
    pub tactical: Arc<TacticalStage>,
    pub prompts: Arc<PromptGenerator>,
    pub scorer: Arc<HealthScorer>,
    pub lifecycle: Arc<LifecycleEngine>,
    pub factory: Arc<AgentFactory>,
    pub validator: Arc<QaValidator>,
    pub bus: Arc<dyn EventBus>,
    permits: Permits,
}

/// One semaphore per component, sized by `worker_permits`.
struct Permits {
    synthesis: Arc<Semaphore>,
    interpret: Arc<Semaphore>,
    prompts: Arc<Semaphore>,
    scoring: Arc<Semaphore>,
    lifecycle: Arc<Semaphore>,
    factory: Arc<Semaphore>,
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        synthesis: Arc<SynthesisEngine>,
        strategic: Arc<StrategicStage>,
        tactical: Arc<TacticalStage>,
        prompts: Arc<PromptGenerator>,
        scorer: Arc<HealthScorer>,
        lifecycle: Arc<LifecycleEngine>,
        factory: Arc<AgentFactory>,
        validator: Arc<QaValidator>,
        bus: Arc<dyn EventBus>,
        worker_permits: usize,
    ) -> Self {
        let permits = Permits {
            synthesis: Arc::new(Semaphore::new(worker_permits)),
            interpret: Arc::new(Semaphore::new(worker_permits)),
            prompts: Arc::new(Semaphore::new(worker_permits)),
            scoring: Arc::new(Semaphore::new(worker_permits)),
            lifecycle: Arc::new(Semaphore::new(worker_permits)),
            factory: Arc::new(Semaphore::new(worker_permits)),
        };
        Self {
            synthesis,
            strategic,
            tactical,
            prompts,
            scorer,
            lifecycle,
            factory,
            validator,
            bus,
            permits,
        }
    }

    /// Subscribe and dispatch until the bus stream ends.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut stream = self.bus.subscribe().await?;
        info!("engine event loop started");
        while let Some(event) = stream.next().await {
            self.dispatch(event);
        }
        info!("bus stream ended, event loop stopping");
        Ok(())
    }

    /// Spawn one gated task for the event and return immediately.
    pub fn dispatch(self: &Arc<Self>, event: Event) {
        let runtime = Arc::clone(self);
        let semaphore = self.semaphore_for(&event);
        tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            runtime.handle_event(event).await;
        });
    }

    fn semaphore_for(&self, event: &Event) -> Arc<Semaphore> {
        match event {
            Event::RawDataIngested { .. } => Arc::clone(&self.permits.synthesis),
            Event::ProfileUpdated { .. } | Event::StrategicReady { .. } => {
                Arc::clone(&self.permits.interpret)
            }
            Event::TacticalReady { .. } => Arc::clone(&self.permits.prompts),
            Event::TaskCompleted { .. } | Event::FeedbackReceived { .. } => {
                Arc::clone(&self.permits.scoring)
            }
            Event::HealthUpdated { .. } => Arc::clone(&self.permits.lifecycle),
            Event::AgentCreated { .. }
            | Event::AgentValidated { .. }
            | Event::AgentDeprecated { .. } => Arc::clone(&self.permits.factory),
        }
    }

    /// Route one event to its component. Transient failures are retried
    /// with backoff; every handler is idempotent (dedupe keys, CAS writes),
    /// so a replayed attempt is safe. Errors are logged, never propagated:
    /// a bad event must not take the loop down.
    #[instrument(skip(self), fields(kind = event.kind()))]
    pub async fn handle_event(&self, event: Event) {
        let kind = event.kind();
        let outcome: Result<()> = with_backoff(kind, 3, || {
            let event = event.clone();
            async move {
                match event {
                    Event::RawDataIngested { .. } => {
                        self.synthesis.run_cycle().await.map(|_| ())
                    }
                    Event::ProfileUpdated { .. } => self.strategic.run().await.map(|_| ()),
                    Event::StrategicReady { .. } => self.tactical.run().await.map(|_| ()),
                    Event::TacticalReady { .. } => {
                        self.prompts.regenerate_all().await.map(|_| ())
                    }
                    Event::TaskCompleted {
                        agent_id,
                        success,
                        latency_ms,
                        feedback_score,
                        dedupe_key,
                    } => self
                        .scorer
                        .observe(agent_id, success, latency_ms, feedback_score, &dedupe_key)
                        .await
                        .map(|_| ()),
                    Event::FeedbackReceived { agent_id, score } => {
                        self.scorer.record_feedback(agent_id, score).await
                    }
                    Event::HealthUpdated { agent_id, .. } => {
                        self.lifecycle.evaluate(agent_id).await.map(|_| ())
                    }
                    Event::AgentCreated { agent_id } => {
                        self.validator.validate(agent_id).await.map(|_| ())
                    }
                    Event::AgentValidated { agent_id } | Event::AgentDeprecated { agent_id } => {
                        debug!(%agent_id, "terminal event, nothing to do");
                        Ok(())
                    }
                }
            }
        })
        .await;
        if let Err(err) = outcome {
            if err.is_transient() {
                warn!(error = %err, "handler failed after retries");
            } else {
                error!(error = %err, "handler failed");
            }
        }
    }

    /// Spawn the periodic sweeps: synthesis (picks up raw data that arrived
    /// without an event), the lifecycle decision sweep over stale scores,
    /// and the factory gap sweep followed by pending-QA validation.
    pub fn spawn_sweeps(
        self: &Arc<Self>,
        synthesis_every: std::time::Duration,
        lifecycle_every: std::time::Duration,
        factory_every: std::time::Duration,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::with_capacity(3);

        let runtime = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(synthesis_every);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(err) = runtime.synthesis.run_cycle().await {
                    warn!(error = %err, "synthesis sweep failed");
                }
            }
        }));

        let runtime = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(lifecycle_every);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(err) = runtime.lifecycle.sweep().await {
                    warn!(error = %err, "lifecycle sweep failed");
                }
            }
        }));

        let runtime = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(factory_every);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Err(err) = runtime.factory.sweep().await {
                    warn!(error = %err, "factory sweep failed");
                }
                if let Err(err) = runtime.validator.validate_pending().await {
                    warn!(error = %err, "pending validation sweep failed");
                }
            }
        }));

        handles
    }
}
