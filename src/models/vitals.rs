use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the six model features, in feature-vector order.
pub const FEATURE_NAMES: [&str; 6] = ["MAP", "HR", "SpO2", "RR", "Temp", "EtCO2"];

/// One monitor reading. Values are taken as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsSample {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "MAP")]
    pub map: f64,
    #[serde(rename = "HR")]
    pub heart_rate: f64,
    #[serde(rename = "SpO2")]
    pub spo2: f64,
    #[serde(rename = "RR")]
    pub respiratory_rate: f64,
    #[serde(rename = "Temp")]
    pub temperature: f64,
    #[serde(rename = "EtCO2")]
    pub etco2: f64,
    #[serde(rename = "BIS", default, skip_serializing_if = "Option::is_none")]
    pub bis: Option<f64>,
}

impl VitalsSample {
    /// Feature vector in [`FEATURE_NAMES`] order.
    pub fn features(&self) -> [f64; 6] {
        [
            self.map,
            self.heart_rate,
            self.spo2,
            self.respiratory_rate,
            self.temperature,
            self.etco2,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Hypotension,
    Tachycardia,
    Hypoxemia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub description: String,
    pub severity: Severity,
    pub source: String,
}
