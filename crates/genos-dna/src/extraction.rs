//! Structured extraction schema
//!
//! The shape the completion service is asked to return. Missing fields
//! fall back to neutral defaults rather than failing the whole batch.

use serde::Deserialize;

fn default_confidence() -> f64 {
    0.7
}

fn default_priority() -> u8 {
    5
}

fn default_importance() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExtractedDna {
    #[serde(default)]
    pub interests: Vec<ExtractedInterest>,
    #[serde(default)]
    pub goals: Vec<ExtractedGoal>,
    #[serde(default)]
    pub values: Vec<ExtractedValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedInterest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedGoal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_importance")]
    pub importance: f64,
}
