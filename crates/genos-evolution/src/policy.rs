//! Lifecycle decision table
//!
//! Pure score-to-decision mapping, kept free of I/O so it can be tested
//! exhaustively and benchmarked in isolation.

use chrono::Duration;

use genos_common::{
    APOPTOSIS_THRESHOLD, EVOLUTION_THRESHOLD, MITOSIS_COOLDOWN_HOURS, MITOSIS_THRESHOLD,
    SAMPLE_FLOOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Retire the agent.
    Apoptosis,
    /// Regenerate its configuration.
    Evolve,
    /// Duplicate the agent to absorb load.
    Mitosis,
    /// Nothing to do.
    Hold,
}

impl Decision {
    pub fn kind(&self) -> &'static str {
        match self {
            Decision::Apoptosis => "apoptosis",
            Decision::Evolve => "evolve",
            Decision::Mitosis => "mitosis",
            Decision::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub apoptosis_below: f64,
    pub evolve_below: f64,
    pub mitosis_at: f64,
    /// Observations required before any destructive decision fires.
    pub sample_floor: u64,
    /// Mitosis needs this multiple of the floor.
    pub mitosis_floor_multiplier: u64,
    /// Minimum spacing between mitosis events within one lineage.
    pub mitosis_cooldown: Duration,
    /// Identical decisions within this window are suppressed.
    pub decision_dedupe_window: Duration,
    /// Scores are bucketed at this granularity for dedupe keys.
    pub score_bucket: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            apoptosis_below: APOPTOSIS_THRESHOLD,
            evolve_below: EVOLUTION_THRESHOLD,
            mitosis_at: MITOSIS_THRESHOLD,
            sample_floor: SAMPLE_FLOOR,
            mitosis_floor_multiplier: 2,
            mitosis_cooldown: Duration::hours(MITOSIS_COOLDOWN_HOURS),
            decision_dedupe_window: Duration::minutes(10),
            score_bucket: 0.05,
        }
    }
}

impl PolicyConfig {
    /// Bucketed score used in decision dedupe keys, e.g. 0.37 -> "0.35".
    pub fn bucket(&self, score: f64) -> String {
        let bucketed = (score / self.score_bucket).floor() * self.score_bucket;
        format!("{bucketed:.2}")
    }
}

/// Map a health score and sample count to a lifecycle decision.
///
/// Every branch holds until the sample floor is met so a brand-new agent
/// is never retired or rewritten on a handful of observations.
pub fn decide(score: f64, sample_count: u64, config: &PolicyConfig) -> Decision {
    if sample_count < config.sample_floor {
        return Decision::Hold;
    }
    if score < config.apoptosis_below {
        return Decision::Apoptosis;
    }
    if score < config.evolve_below {
        return Decision::Evolve;
    }
    if score >= config.mitosis_at
        && sample_count >= config.sample_floor * config.mitosis_floor_multiplier
    {
        return Decision::Mitosis;
    }
    Decision::Hold
}
