//! Rolling health scoring
//!
//! Consumes `task_completed` observations, deduplicates by key, updates the
//! per-agent aggregate, and publishes `health_updated`.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use genos_bus::EventBus;
use genos_common::{AgentHealth, Event, Result, NEUTRAL_SCORE, SAMPLE_FLOOR};
use genos_store::HealthStore;

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub success_weight: f64,
    pub latency_weight: f64,
    pub feedback_weight: f64,
    /// Observations required before the score leaves neutral.
    pub sample_floor: u64,
    /// Latency observations kept per agent for the percentile baseline.
    pub latency_window: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            success_weight: 0.6,
            latency_weight: 0.25,
            feedback_weight: 0.15,
            sample_floor: SAMPLE_FLOOR,
            latency_window: 256,
        }
    }
}

pub struct HealthScorer {
    healths: Arc<dyn HealthStore>,
    bus: Arc<dyn EventBus>,
    config: ScoringConfig,
    /// Rolling latency windows, one per agent.
    latencies: DashMap<Uuid, VecDeque<u64>>,
}

impl HealthScorer {
    pub fn new(healths: Arc<dyn HealthStore>, bus: Arc<dyn EventBus>, config: ScoringConfig) -> Self {
        Self {
            healths,
            bus,
            config,
            latencies: DashMap::new(),
        }
    }

    /// Apply one `task_completed` observation. Returns the recomputed
    /// health, or `None` when the dedupe key was already seen.
    #[instrument(skip(self))]
    pub async fn observe(
        &self,
        agent_id: Uuid,
        success: bool,
        latency_ms: u64,
        feedback_score: Option<f64>,
        dedupe_key: &str,
    ) -> Result<Option<AgentHealth>> {
        if !self.healths.claim_dedupe_key(dedupe_key).await? {
            debug!(%agent_id, dedupe_key, "duplicate observation dropped");
            return Ok(None);
        }

        // The claim only sticks once the aggregate write lands; otherwise
        // a redelivery must be able to retry this observation.
        match self.apply(agent_id, success, latency_ms, feedback_score).await {
            Ok(health) => Ok(Some(health)),
            Err(err) => {
                if let Err(release_err) = self.healths.release_dedupe_key(dedupe_key).await {
                    warn!(%agent_id, dedupe_key, error = %release_err, "failed to release dedupe key");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        agent_id: Uuid,
        success: bool,
        latency_ms: u64,
        feedback_score: Option<f64>,
    ) -> Result<AgentHealth> {
        let latency_score = self.latency_score(agent_id, latency_ms);

        let mut health = self.healths.get_or_default(agent_id).await?;
        health.record(success, latency_ms, feedback_score);
        health.score = self.compute_score(&health, latency_score);
        self.healths.put(health.clone()).await?;

        self.bus
            .publish(&Event::HealthUpdated {
                agent_id,
                score: health.score,
            })
            .await?;
        Ok(health)
    }

    /// Fold a standalone `feedback_received` score into the aggregate.
    /// The stored score is left alone; the next task completion recomputes
    /// it with the new feedback average.
    #[instrument(skip(self))]
    pub async fn record_feedback(&self, agent_id: Uuid, score: f64) -> Result<()> {
        let mut health = self.healths.get_or_default(agent_id).await?;
        health.feedback_total += score.clamp(0.0, 1.0);
        health.feedback_samples += 1;
        self.healths.put(health).await?;
        Ok(())
    }

    /// Midrank percentile of this latency in the agent's rolling window:
    /// the fraction of recent observations slower than it, with ties
    /// counting half. A steady latency therefore sits at 0.5, faster-than-
    /// usual calls score toward 1.0. Neutral until the window has samples.
    fn latency_score(&self, agent_id: Uuid, latency_ms: u64) -> f64 {
        let mut window = self.latencies.entry(agent_id).or_default();
        let score = if window.is_empty() {
            NEUTRAL_SCORE
        } else {
            let slower = window.iter().filter(|&&l| l > latency_ms).count();
            let equal = window.iter().filter(|&&l| l == latency_ms).count();
            ((slower as f64 + equal as f64 * 0.5) / window.len() as f64).clamp(0.0, 1.0)
        };
        window.push_back(latency_ms);
        while window.len() > self.config.latency_window {
            window.pop_front();
        }
        score
    }

    fn compute_score(&self, health: &AgentHealth, latency_score: f64) -> f64 {
        if health.sample_count < self.config.sample_floor {
            return NEUTRAL_SCORE;
        }
        let score = self.config.success_weight * health.success_rate()
            + self.config.latency_weight * latency_score
            + self.config.feedback_weight * health.avg_feedback();
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genos_bus::MemoryBus;
    use genos_common::Entity;
    use genos_store::MemoryStore;

    async fn scorer() -> (Arc<MemoryStore>, HealthScorer) {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let bus = Arc::new(MemoryBus::new());
        let scorer = HealthScorer::new(store.clone(), bus, ScoringConfig::default());
        (store, scorer)
    }

    #[tokio::test]
    async fn test_score_neutral_below_sample_floor() {
        let (_, scorer) = scorer().await;
        let agent_id = Uuid::new_v4();
        for i in 0..4 {
            let health = scorer
                .observe(agent_id, false, 100, None, &format!("k{i}"))
                .await
                .unwrap()
                .unwrap();
            assert!((health.score - NEUTRAL_SCORE).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_score_leaves_neutral_at_floor() {
        let (_, scorer) = scorer().await;
        let agent_id = Uuid::new_v4();
        let mut last = None;
        for i in 0..5 {
            last = scorer
                .observe(agent_id, true, 100, Some(1.0), &format!("k{i}"))
                .await
                .unwrap();
        }
        let health = last.unwrap();
        assert_eq!(health.sample_count, 5);
        // All successes, perfect feedback; only latency holds it below 1.
        assert!(health.score > 0.75);
    }

    #[tokio::test]
    async fn test_duplicate_dedupe_key_does_not_double_count() {
        let (store, scorer) = scorer().await;
        let agent_id = Uuid::new_v4();
        scorer
            .observe(agent_id, true, 100, None, "same-key")
            .await
            .unwrap();
        let deduped = scorer
            .observe(agent_id, true, 100, None, "same-key")
            .await
            .unwrap();
        assert!(deduped.is_none());

        let health = store.get_or_default(agent_id).await.unwrap();
        assert_eq!(health.sample_count, 1);
        assert_eq!(health.success_count, 1);
    }

    /// Health store whose first put fails transiently, delegating
    /// everything else.
    struct FlakyPutStore {
        inner: Arc<MemoryStore>,
        failures_left: parking_lot::Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl HealthStore for FlakyPutStore {
        async fn get_or_default(&self, agent_id: Uuid) -> genos_common::Result<AgentHealth> {
            self.inner.get_or_default(agent_id).await
        }
        async fn put(&self, health: AgentHealth) -> genos_common::Result<()> {
            {
                let mut left = self.failures_left.lock();
                if *left > 0 {
                    *left -= 1;
                    return Err(genos_common::GenosError::TransientIo(
                        "health write dropped".into(),
                    ));
                }
            }
            self.inner.put(health).await
        }
        async fn all(&self) -> genos_common::Result<Vec<AgentHealth>> {
            self.inner.all().await
        }
        async fn claim_dedupe_key(&self, key: &str) -> genos_common::Result<bool> {
            self.inner.claim_dedupe_key(key).await
        }
        async fn release_dedupe_key(&self, key: &str) -> genos_common::Result<()> {
            self.inner.release_dedupe_key(key).await
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_key_free_for_redelivery() {
        let store = Arc::new(MemoryStore::new(Entity::new("ada")));
        let flaky = Arc::new(FlakyPutStore {
            inner: store.clone(),
            failures_left: parking_lot::Mutex::new(1),
        });
        let scorer = HealthScorer::new(flaky, Arc::new(MemoryBus::new()), ScoringConfig::default());
        let agent_id = Uuid::new_v4();

        scorer
            .observe(agent_id, true, 100, None, "task-1")
            .await
            .unwrap_err();

        // The redelivery carries the same key and must still count.
        let health = scorer
            .observe(agent_id, true, 100, None, "task-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(health.sample_count, 1);
    }

    #[tokio::test]
    async fn test_failing_agent_scores_low() {
        let (store, scorer) = scorer().await;
        let agent_id = Uuid::new_v4();
        // 2 successes, 8 failures, poor feedback throughout.
        for i in 0..10 {
            scorer
                .observe(agent_id, i < 2, 200, Some(0.1), &format!("k{i}"))
                .await
                .unwrap();
        }
        let health = store.get_or_default(agent_id).await.unwrap();
        assert_eq!(health.success_count, 2);
        assert_eq!(health.failure_count, 8);
        // 0.6*0.2 + 0.25*0.5 + 0.15*0.1 = 0.26
        assert!(health.score < 0.3, "score was {}", health.score);
    }

    #[tokio::test]
    async fn test_standalone_feedback_folds_into_next_score() {
        let (store, scorer) = scorer().await;
        let agent_id = Uuid::new_v4();
        scorer.record_feedback(agent_id, 0.9).await.unwrap();

        let health = store.get_or_default(agent_id).await.unwrap();
        assert_eq!(health.feedback_samples, 1);
        // No recomputation without a task completion.
        assert!((health.score - NEUTRAL_SCORE).abs() < 1e-9);

        for i in 0..5 {
            scorer
                .observe(agent_id, true, 100, None, &format!("k{i}"))
                .await
                .unwrap();
        }
        let health = store.get_or_default(agent_id).await.unwrap();
        assert!((health.avg_feedback() - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_faster_latency_scores_higher() {
        let (_, scorer) = scorer().await;
        let agent_id = Uuid::new_v4();
        for i in 0..20 {
            scorer
                .observe(agent_id, true, 500, None, &format!("slow{i}"))
                .await
                .unwrap();
        }
        let fast = scorer
            .observe(agent_id, true, 50, None, "fast")
            .await
            .unwrap()
            .unwrap();
        let slow = scorer
            .observe(agent_id, true, 2000, None, "slow-again")
            .await
            .unwrap()
            .unwrap();
        assert!(fast.score > slow.score);
    }
}
