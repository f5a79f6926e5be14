//! Result values returned by the engine. All are computed fresh per request.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Headline channel requested for a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VitalsType {
    #[serde(rename = "MAP")]
    Map,
    #[serde(rename = "HR")]
    HeartRate,
    #[serde(rename = "SpO2")]
    SpO2,
}

impl FromStr for VitalsType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "map" => Ok(VitalsType::Map),
            "hr" | "heart_rate" => Ok(VitalsType::HeartRate),
            "spo2" => Ok(VitalsType::SpO2),
            _ => Err(EngineError::UnsupportedVitalsType(s.to_string())),
        }
    }
}

impl fmt::Display for VitalsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VitalsType::Map => write!(f, "MAP"),
            VitalsType::HeartRate => write!(f, "HR"),
            VitalsType::SpO2 => write!(f, "SpO2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "predicted_MAP")]
    pub predicted_map: f64,
    #[serde(rename = "predicted_HR")]
    pub predicted_hr: f64,
    #[serde(rename = "predicted_SpO2")]
    pub predicted_spo2: f64,
}

impl TrajectoryPoint {
    pub fn value_of(&self, target: VitalsType) -> f64 {
        match target {
            VitalsType::Map => self.predicted_map,
            VitalsType::HeartRate => self.predicted_hr,
            VitalsType::SpO2 => self.predicted_spo2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Cut points 0.4 and 0.7, both exclusive.
    pub fn from_probability(p: f64) -> Self {
        if p > 0.7 {
            RiskLevel::High
        } else if p > 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Signed per-feature contribution to a model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExplanation {
    pub feature: String,
    pub value: f64,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub target: VitalsType,
    pub trajectory: Vec<TrajectoryPoint>,
    pub hypotension_risk: f64,
    pub risk_level: RiskLevel,
    pub explanations: Vec<FeatureExplanation>,
    pub reason: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SepsisRiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// SIRS flags. A criterion that cannot be evaluated is `false`, never unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SirsCriteria {
    pub temperature: bool,
    pub heart_rate: bool,
    pub respiratory: bool,
    pub wbc: bool,
}

impl SirsCriteria {
    pub fn count(&self) -> u8 {
        [self.temperature, self.heart_rate, self.respiratory, self.wbc]
            .iter()
            .filter(|flag| **flag)
            .count() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SepsisRiskAssessment {
    pub risk_score: f64,
    pub risk_level: SepsisRiskLevel,
    pub sirs_criteria: SirsCriteria,
    pub qsofa_score: u8,
    pub ml_probability: f64,
    pub evidence: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugDosageRecommendation {
    pub drug_name: String,
    pub recommended_dose: f64,
    pub dose_unit: String,
    pub route: String,
    pub frequency: String,
    pub duration: String,
    pub contraindications: Vec<String>,
    pub monitoring_parameters: Vec<String>,
    /// Advisory only; the dose is never clamped to the recorded maximum.
    pub exceeds_max_dose: bool,
    pub confidence: f64,
    pub rationale: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0 => RiskLevel::Low)]
    #[test_case(0.4 => RiskLevel::Low)]
    #[test_case(0.41 => RiskLevel::Medium)]
    #[test_case(0.7 => RiskLevel::Medium)]
    #[test_case(0.71 => RiskLevel::High)]
    #[test_case(1.0 => RiskLevel::High)]
    fn test_risk_level_cut_points(p: f64) -> RiskLevel {
        RiskLevel::from_probability(p)
    }

    #[test]
    fn test_vitals_type_parsing() {
        assert_eq!("map".parse::<VitalsType>().unwrap(), VitalsType::Map);
        assert_eq!("HR".parse::<VitalsType>().unwrap(), VitalsType::HeartRate);
        assert_eq!("SpO2".parse::<VitalsType>().unwrap(), VitalsType::SpO2);
        assert!(matches!(
            "lactate".parse::<VitalsType>(),
            Err(EngineError::UnsupportedVitalsType(_))
        ));
    }

    #[test_case(VitalsType::Map => 61.0)]
    #[test_case(VitalsType::HeartRate => 104.0)]
    #[test_case(VitalsType::SpO2 => 95.5)]
    fn test_value_of_target(target: VitalsType) -> f64 {
        let point = TrajectoryPoint {
            timestamp: Utc::now(),
            predicted_map: 61.0,
            predicted_hr: 104.0,
            predicted_spo2: 95.5,
        };
        point.value_of(target)
    }

    #[test]
    fn test_sirs_count() {
        let sirs = SirsCriteria {
            temperature: true,
            heart_rate: false,
            respiratory: true,
            wbc: true,
        };
        assert_eq!(sirs.count(), 3);
        assert_eq!(SirsCriteria::default().count(), 0);
    }
}
