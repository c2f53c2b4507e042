//! Engine configuration

use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use genos_dna::SynthesisConfig;
use genos_evolution::{PolicyConfig, ScoringConfig};
use genos_factory::{FactoryConfig, QaConfig};

/// Engine configuration, loaded from defaults plus `GENOS_*` environment
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Display name of the entity this deployment serves.
    pub entity_name: String,
    pub bus: BusSettings,
    pub llm: LlmSettings,
    pub synthesis: SynthesisSettings,
    pub scoring: ScoringSettings,
    pub policy: PolicySettings,
    pub factory: FactorySettings,
    /// Concurrent event handlers per component.
    pub worker_permits: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusMode {
    Memory,
    Nats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    pub mode: BusMode,
    pub nats_url: String,
    pub subject_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub endpoint: String,
    /// Never logged.
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSettings {
    pub batch_cap: usize,
    pub staleness_days: i64,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    pub success_weight: f64,
    pub latency_weight: f64,
    pub feedback_weight: f64,
    pub sample_floor: u64,
    pub latency_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    pub apoptosis_below: f64,
    pub evolve_below: f64,
    pub mitosis_at: f64,
    pub mitosis_cooldown_hours: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorySettings {
    pub gap_window_hours: i64,
    pub sweep_interval_secs: u64,
    pub battery_size: usize,
    pub pass_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let scoring = ScoringConfig::default();
        let policy = PolicyConfig::default();
        let synthesis = SynthesisConfig::default();
        let factory = FactoryConfig::default();
        let qa = QaConfig::default();
        Self {
            entity_name: "entity".to_string(),
            bus: BusSettings {
                mode: BusMode::Memory,
                nats_url: "nats://localhost:4222".to_string(),
                subject_prefix: "genos.events".to_string(),
            },
            llm: LlmSettings {
                endpoint: "http://localhost:8080/v1/chat/completions".to_string(),
                api_key: String::new(),
                model: "gpt-4o-mini".to_string(),
            },
            synthesis: SynthesisSettings {
                batch_cap: synthesis.batch_cap,
                staleness_days: synthesis.staleness_days,
                interval_secs: 300,
            },
            scoring: ScoringSettings {
                success_weight: scoring.success_weight,
                latency_weight: scoring.latency_weight,
                feedback_weight: scoring.feedback_weight,
                sample_floor: scoring.sample_floor,
                latency_window: scoring.latency_window,
            },
            policy: PolicySettings {
                apoptosis_below: policy.apoptosis_below,
                evolve_below: policy.evolve_below,
                mitosis_at: policy.mitosis_at,
                mitosis_cooldown_hours: policy.mitosis_cooldown.num_hours(),
                sweep_interval_secs: 3600,
            },
            factory: FactorySettings {
                gap_window_hours: factory.gap_window.num_hours(),
                sweep_interval_secs: 3600,
                battery_size: qa.battery_size,
                pass_threshold: qa.pass_threshold,
            },
            worker_permits: genos_common::DEFAULT_WORKER_PERMITS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();

        if let Ok(name) = std::env::var("GENOS_ENTITY_NAME") {
            cfg.entity_name = name;
        }

        if let Ok(mode) = std::env::var("GENOS_BUS_MODE") {
            cfg.bus.mode = match mode.to_lowercase().as_str() {
                "nats" => BusMode::Nats,
                _ => BusMode::Memory,
            };
        }
        if let Ok(url) = std::env::var("GENOS_NATS_URL") {
            cfg.bus.nats_url = url;
        }
        if let Ok(prefix) = std::env::var("GENOS_SUBJECT_PREFIX") {
            cfg.bus.subject_prefix = prefix;
        }

        if let Ok(endpoint) = std::env::var("GENOS_LLM_ENDPOINT") {
            cfg.llm.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("GENOS_LLM_API_KEY") {
            cfg.llm.api_key = key;
        }
        if let Ok(model) = std::env::var("GENOS_LLM_MODEL") {
            cfg.llm.model = model;
        }

        if let Ok(val) = std::env::var("GENOS_SYNTHESIS_BATCH_CAP") {
            if let Ok(v) = val.parse() {
                cfg.synthesis.batch_cap = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_SYNTHESIS_STALENESS_DAYS") {
            if let Ok(v) = val.parse() {
                cfg.synthesis.staleness_days = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_SYNTHESIS_INTERVAL_SECS") {
            if let Ok(v) = val.parse() {
                cfg.synthesis.interval_secs = v;
            }
        }

        if let Ok(val) = std::env::var("GENOS_SCORING_SAMPLE_FLOOR") {
            if let Ok(v) = val.parse() {
                cfg.scoring.sample_floor = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_SCORING_LATENCY_WINDOW") {
            if let Ok(v) = val.parse() {
                cfg.scoring.latency_window = v;
            }
        }

        if let Ok(val) = std::env::var("GENOS_POLICY_MITOSIS_COOLDOWN_HOURS") {
            if let Ok(v) = val.parse() {
                cfg.policy.mitosis_cooldown_hours = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_POLICY_SWEEP_INTERVAL_SECS") {
            if let Ok(v) = val.parse() {
                cfg.policy.sweep_interval_secs = v;
            }
        }

        if let Ok(val) = std::env::var("GENOS_FACTORY_GAP_WINDOW_HOURS") {
            if let Ok(v) = val.parse() {
                cfg.factory.gap_window_hours = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_FACTORY_SWEEP_INTERVAL_SECS") {
            if let Ok(v) = val.parse() {
                cfg.factory.sweep_interval_secs = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_QA_BATTERY_SIZE") {
            if let Ok(v) = val.parse() {
                cfg.factory.battery_size = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_QA_PASS_THRESHOLD") {
            if let Ok(v) = val.parse() {
                cfg.factory.pass_threshold = v;
            }
        }
        if let Ok(val) = std::env::var("GENOS_WORKER_PERMITS") {
            if let Ok(v) = val.parse() {
                cfg.worker_permits = v;
            }
        }

        Ok(cfg)
    }

    pub fn synthesis_config(&self) -> SynthesisConfig {
        SynthesisConfig {
            batch_cap: self.synthesis.batch_cap,
            staleness_days: self.synthesis.staleness_days,
            ..SynthesisConfig::default()
        }
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            success_weight: self.scoring.success_weight,
            latency_weight: self.scoring.latency_weight,
            feedback_weight: self.scoring.feedback_weight,
            sample_floor: self.scoring.sample_floor,
            latency_window: self.scoring.latency_window,
        }
    }

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            apoptosis_below: self.policy.apoptosis_below,
            evolve_below: self.policy.evolve_below,
            mitosis_at: self.policy.mitosis_at,
            sample_floor: self.scoring.sample_floor,
            mitosis_cooldown: Duration::hours(self.policy.mitosis_cooldown_hours),
            ..PolicyConfig::default()
        }
    }

    pub fn factory_config(&self) -> FactoryConfig {
        FactoryConfig {
            gap_window: Duration::hours(self.factory.gap_window_hours),
            ..FactoryConfig::default()
        }
    }

    pub fn qa_config(&self) -> QaConfig {
        QaConfig {
            battery_size: self.factory.battery_size,
            pass_threshold: self.factory.pass_threshold,
            ..QaConfig::default()
        }
    }

    pub fn synthesis_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.synthesis.interval_secs.max(1))
    }

    pub fn policy_sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.policy.sweep_interval_secs.max(1))
    }

    pub fn factory_sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.factory.sweep_interval_secs.max(1))
    }
}
