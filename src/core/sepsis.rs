//! SIRS / qSOFA screening blended with a learned sepsis probability.
//!
//! The blend follows a fixed precedence table: the rule-based scores set the
//! risk level and a floor on the score, and the model probability can only
//! raise the score within that level's band.

use tracing::{info, instrument};

use crate::core::dataset::{TrainingSource, SEPSIS_FEATURE_NAMES};
use crate::core::ml::{FittedModel, TrainParams};
use crate::error::{EngineError, Result};
use crate::models::{
    LabValues, PatientProfile, SepsisRiskAssessment, SepsisRiskLevel, SirsCriteria, VitalsSample,
};
use crate::store::ModelArtifact;

pub const SEPSIS_MODEL_NAME: &str = "sepsis";

/// Placeholder confidence; not derived from the blend or model calibration.
pub const SEPSIS_CONFIDENCE: f64 = 0.85;

/// Systolic pressure estimated from MAP when no cuff reading is available.
pub const SYSTOLIC_FROM_MAP: f64 = 1.4;

pub fn estimated_systolic(map: f64) -> f64 {
    map * SYSTOLIC_FROM_MAP
}

/// SIRS flags from vitals and, when present, the white-cell count.
/// EtCO2 below 32 mmHg stands in for PaCO2.
pub fn evaluate_sirs(vitals: &VitalsSample, labs: Option<&LabValues>) -> SirsCriteria {
    SirsCriteria {
        temperature: vitals.temperature > 38.0 || vitals.temperature < 36.0,
        heart_rate: vitals.heart_rate > 90.0,
        respiratory: vitals.respiratory_rate > 20.0 || vitals.etco2 < 32.0,
        wbc: labs
            .and_then(|l| l.wbc)
            .map_or(false, |wbc| wbc > 12.0 || wbc < 4.0),
    }
}

/// qSOFA without the mental-status component, so the score is 0..=2.
pub fn qsofa_score(vitals: &VitalsSample) -> u8 {
    let mut score = 0;
    if estimated_systolic(vitals.map) <= 100.0 {
        score += 1;
    }
    if vitals.respiratory_rate >= 22.0 {
        score += 1;
    }
    score
}

/// Applies the precedence table to the rule scores and model probability.
pub fn blend(sirs_count: u8, qsofa: u8, ml_probability: f64) -> (f64, SepsisRiskLevel) {
    let (score, level) = if sirs_count >= 2 && qsofa >= 2 {
        (ml_probability.max(0.8), SepsisRiskLevel::Critical)
    } else if sirs_count >= 2 || qsofa >= 2 {
        ((ml_probability * 0.8).max(0.6), SepsisRiskLevel::High)
    } else if sirs_count == 1 || qsofa == 1 {
        ((ml_probability * 0.6).max(0.3), SepsisRiskLevel::Medium)
    } else {
        (ml_probability * 0.4, SepsisRiskLevel::Low)
    };
    (score.clamp(0.0, 1.0), level)
}

pub fn recommendations(level: SepsisRiskLevel) -> Vec<String> {
    let list: &[&str] = match level {
        SepsisRiskLevel::Critical => &[
            "IMMEDIATE: Initiate sepsis protocol",
            "Obtain blood cultures before antibiotics",
            "Start broad-spectrum antibiotics within 1 hour",
            "Aggressive fluid resuscitation (30ml/kg crystalloid)",
            "Serial lactate measurements",
            "Consider ICU consultation",
        ],
        SepsisRiskLevel::High => &[
            "HIGH: Close monitoring required",
            "Obtain blood cultures and labs",
            "Consider early antibiotic therapy",
            "Fluid challenge if hypotensive",
            "Frequent vital sign monitoring",
        ],
        SepsisRiskLevel::Medium => &[
            "Increased monitoring frequency",
            "Consider lab workup if clinical concern",
            "Watch for clinical deterioration",
        ],
        SepsisRiskLevel::Low => &["Continue routine monitoring"],
    };
    list.iter().map(|s| s.to_string()).collect()
}

fn evidence(
    sirs: &SirsCriteria,
    vitals: &VitalsSample,
    labs: Option<&LabValues>,
) -> Vec<String> {
    let mut evidence = Vec::new();

    if sirs.temperature {
        if vitals.temperature > 38.0 {
            evidence.push(format!("Fever present ({:.1}°C)", vitals.temperature));
        } else {
            evidence.push(format!("Hypothermia present ({:.1}°C)", vitals.temperature));
        }
    }
    if sirs.heart_rate {
        evidence.push(format!("Tachycardia present ({:.0} bpm)", vitals.heart_rate));
    }
    if sirs.respiratory {
        if vitals.respiratory_rate > 20.0 {
            evidence.push(format!("Tachypnea present ({:.0} /min)", vitals.respiratory_rate));
        }
        if vitals.etco2 < 32.0 {
            evidence.push(format!("Hypocapnia present (EtCO2 {:.0} mmHg)", vitals.etco2));
        }
    }
    if sirs.wbc {
        if let Some(wbc) = labs.and_then(|l| l.wbc) {
            let label = if wbc > 12.0 { "Leukocytosis" } else { "Leukopenia" };
            evidence.push(format!("{label} present (WBC {wbc:.1} x10^9/L)"));
        }
    }

    let systolic = estimated_systolic(vitals.map);
    if systolic <= 100.0 {
        evidence.push(format!(
            "qSOFA: estimated systolic BP {systolic:.0} mmHg (<= 100)"
        ));
    }
    if vitals.respiratory_rate >= 22.0 {
        evidence.push(format!(
            "qSOFA: respiratory rate {:.0} /min (>= 22)",
            vitals.respiratory_rate
        ));
    }

    evidence
}

/// Model input in [`SEPSIS_FEATURE_NAMES`] order, substituting lab defaults.
pub fn sepsis_features(
    vitals: &VitalsSample,
    patient: &PatientProfile,
    labs: Option<&LabValues>,
) -> [f64; 9] {
    let labs = labs.copied().unwrap_or_default();
    [
        vitals.temperature,
        vitals.heart_rate,
        vitals.respiratory_rate,
        labs.wbc_or_default(),
        estimated_systolic(vitals.map),
        vitals.map,
        labs.lactate_or_default(),
        f64::from(patient.age),
        if patient.is_male() { 1.0 } else { 0.0 },
    ]
}

#[derive(Debug, Clone)]
pub struct SepsisAssessor {
    fitted: FittedModel,
    seed: Option<u64>,
}

impl SepsisAssessor {
    #[instrument(skip(source, params))]
    pub fn train(
        source: &dyn TrainingSource,
        samples: usize,
        seed: u64,
        params: TrainParams,
    ) -> Result<Self> {
        let dataset = source.generate(samples, seed);
        if dataset.width() != SEPSIS_FEATURE_NAMES.len() {
            return Err(EngineError::InvalidDataset(format!(
                "sepsis model expects {} features, source provides {}",
                SEPSIS_FEATURE_NAMES.len(),
                dataset.width()
            )));
        }
        let fitted = FittedModel::train(&dataset, params)?;
        info!(samples, seed, "sepsis model trained");
        Ok(Self {
            fitted,
            seed: Some(seed),
        })
    }

    pub fn ml_probability(
        &self,
        vitals: &VitalsSample,
        patient: &PatientProfile,
        labs: Option<&LabValues>,
    ) -> f64 {
        self.fitted.predict(&sepsis_features(vitals, patient, labs))
    }

    pub fn assess(
        &self,
        vitals: &VitalsSample,
        patient: &PatientProfile,
        labs: Option<&LabValues>,
    ) -> SepsisRiskAssessment {
        let sirs = evaluate_sirs(vitals, labs);
        let qsofa = qsofa_score(vitals);
        let ml_probability = self.ml_probability(vitals, patient, labs);
        let (risk_score, risk_level) = blend(sirs.count(), qsofa, ml_probability);

        SepsisRiskAssessment {
            risk_score,
            risk_level,
            sirs_criteria: sirs,
            qsofa_score: qsofa,
            ml_probability,
            evidence: evidence(&sirs, vitals, labs),
            recommendations: recommendations(risk_level),
            confidence: SEPSIS_CONFIDENCE,
        }
    }

    pub fn to_artifact(&self) -> ModelArtifact {
        ModelArtifact::new(SEPSIS_MODEL_NAME, self.fitted.clone(), self.seed)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        artifact.check(SEPSIS_MODEL_NAME, &SEPSIS_FEATURE_NAMES)?;
        Ok(Self {
            seed: artifact.seed,
            fitted: artifact.fitted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::SyntheticSepsisSource;
    use crate::models::Gender;
    use chrono::Utc;
    use proptest::prelude::*;
    use test_case::test_case;

    fn vitals(map: f64, hr: f64, rr: f64, temp: f64) -> VitalsSample {
        VitalsSample {
            timestamp: Utc::now(),
            map,
            heart_rate: hr,
            spo2: 98.0,
            respiratory_rate: rr,
            temperature: temp,
            etco2: 35.0,
            bis: None,
        }
    }

    fn assessor() -> SepsisAssessor {
        SepsisAssessor::train(
            &SyntheticSepsisSource::default(),
            1500,
            42,
            TrainParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_wbc_never_fires() {
        let v = vitals(80.0, 80.0, 16.0, 37.0);
        assert!(!evaluate_sirs(&v, None).wbc);
        assert!(!evaluate_sirs(&v, Some(&LabValues::default())).wbc);
        let labs = LabValues { wbc: Some(3.0), lactate: None };
        assert!(evaluate_sirs(&v, Some(&labs)).wbc);
    }

    #[test]
    fn test_low_etco2_fires_respiratory() {
        let mut v = vitals(80.0, 80.0, 16.0, 37.0);
        v.etco2 = 30.0;
        assert!(evaluate_sirs(&v, None).respiratory);
    }

    #[test_case(80.0, 16.0 => 0 ; "normal")]
    #[test_case(71.4, 16.0 => 1 ; "systolic at 100 counts")]
    #[test_case(72.0, 22.0 => 1 ; "tachypnea only")]
    #[test_case(60.0, 24.0 => 2 ; "both")]
    fn test_qsofa(map: f64, rr: f64) -> u8 {
        qsofa_score(&vitals(map, 80.0, rr, 37.0))
    }

    #[test_case(2, 2, 0.1 => (0.8, SepsisRiskLevel::Critical))]
    #[test_case(4, 2, 0.95 => (0.95, SepsisRiskLevel::Critical))]
    #[test_case(2, 0, 0.5 => (0.6, SepsisRiskLevel::High))]
    #[test_case(0, 2, 1.0 => (0.8, SepsisRiskLevel::High))]
    #[test_case(1, 0, 0.0 => (0.3, SepsisRiskLevel::Medium))]
    #[test_case(0, 1, 1.0 => (0.6, SepsisRiskLevel::Medium))]
    #[test_case(0, 0, 0.5 => (0.2, SepsisRiskLevel::Low))]
    fn test_blend_table(sirs: u8, qsofa: u8, ml: f64) -> (f64, SepsisRiskLevel) {
        blend(sirs, qsofa, ml)
    }

    #[test]
    fn test_critical_scenario() {
        let v = vitals(60.0, 110.0, 24.0, 39.0);
        let labs = LabValues { wbc: Some(14.0), lactate: Some(4.0) };
        let patient = PatientProfile::new(65, 70.0, 170.0, Gender::Male);

        let assessment = assessor().assess(&v, &patient, Some(&labs));
        assert!(assessment.sirs_criteria.count() >= 3);
        assert_eq!(assessment.qsofa_score, 2);
        assert_eq!(assessment.risk_level, SepsisRiskLevel::Critical);
        assert!(assessment.risk_score >= 0.8);
        assert_eq!(assessment.recommendations, recommendations(SepsisRiskLevel::Critical));
        assert_eq!(assessment.confidence, SEPSIS_CONFIDENCE);
        assert!(assessment.evidence.contains(&"Fever present (39.0°C)".to_string()));
        assert!(assessment.evidence.iter().any(|e| e.starts_with("Leukocytosis")));
    }

    #[test]
    fn test_quiet_patient_has_no_evidence() {
        let v = vitals(85.0, 72.0, 14.0, 36.8);
        let patient = PatientProfile::new(40, 70.0, 170.0, Gender::Female);

        let assessment = assessor().assess(&v, &patient, None);
        assert_eq!(assessment.risk_level, SepsisRiskLevel::Low);
        assert!(assessment.evidence.is_empty());
        assert_eq!(assessment.recommendations, vec!["Continue routine monitoring".to_string()]);
        assert!(assessment.risk_score <= 0.4);
    }

    #[test]
    fn test_defaults_substituted_for_missing_labs() {
        let v = vitals(80.0, 80.0, 16.0, 37.0);
        let patient = PatientProfile::new(50, 70.0, 170.0, Gender::Female);
        let explicit = LabValues { wbc: Some(7.0), lactate: Some(1.5) };
        assert_eq!(
            sepsis_features(&v, &patient, None),
            sepsis_features(&v, &patient, Some(&explicit))
        );

        let model = assessor();
        assert_eq!(
            model.ml_probability(&v, &patient, None),
            model.ml_probability(&v, &patient, Some(&explicit))
        );
    }

    #[test]
    fn test_artifact_round_trip_preserves_scores() {
        let model = assessor();
        let restored = SepsisAssessor::from_artifact(model.to_artifact()).unwrap();
        let v = vitals(62.0, 105.0, 23.0, 38.4);
        let patient = PatientProfile::new(72, 80.0, 180.0, Gender::Male);
        assert_eq!(
            model.ml_probability(&v, &patient, None),
            restored.ml_probability(&v, &patient, None)
        );
    }

    proptest! {
        #[test]
        fn prop_scores_bounded_and_level_follows_rules(
            sirs in 0u8..=4,
            qsofa in 0u8..=2,
            ml in 0.0f64..=1.0,
        ) {
            let (score, level) = blend(sirs, qsofa, ml);
            prop_assert!((0.0..=1.0).contains(&score));
            let expected = if sirs >= 2 && qsofa >= 2 {
                SepsisRiskLevel::Critical
            } else if sirs >= 2 || qsofa >= 2 {
                SepsisRiskLevel::High
            } else if sirs == 1 || qsofa == 1 {
                SepsisRiskLevel::Medium
            } else {
                SepsisRiskLevel::Low
            };
            prop_assert_eq!(level, expected);
        }

        #[test]
        fn prop_level_monotone_in_rule_scores(
            sirs in 0u8..4,
            qsofa in 0u8..2,
            ml in 0.0f64..=1.0,
        ) {
            let (_, base) = blend(sirs, qsofa, ml);
            prop_assert!(blend(sirs + 1, qsofa, ml).1 >= base);
            prop_assert!(blend(sirs, qsofa + 1, ml).1 >= base);
        }

        #[test]
        fn prop_qsofa_in_range(map in -500.0f64..500.0, rr in -100.0f64..100.0) {
            prop_assert!(qsofa_score(&vitals(map, 80.0, rr, 37.0)) <= 2);
        }
    }
}
