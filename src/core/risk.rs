//! Hypotension risk model with per-feature explanations.

use std::cmp::Ordering;

use tracing::{info, instrument};

use crate::core::dataset::TrainingSource;
use crate::core::ml::{FittedModel, TrainParams};
use crate::error::{EngineError, Result};
use crate::models::{FeatureExplanation, VitalsSample, FEATURE_NAMES};
use crate::store::ModelArtifact;

pub const RISK_MODEL_NAME: &str = "hypotension_risk";

#[derive(Debug, Clone, PartialEq)]
pub struct RiskPrediction {
    pub risk: f64,
    /// One entry per feature, in feature-vector order.
    pub explanations: Vec<FeatureExplanation>,
}

impl RiskPrediction {
    /// Explanations ranked by absolute importance; ties keep feature order.
    pub fn top_k(&self, k: usize) -> Vec<&FeatureExplanation> {
        let mut ranked: Vec<&FeatureExplanation> = self.explanations.iter().collect();
        ranked.sort_by(|a, b| {
            b.importance
                .abs()
                .partial_cmp(&a.importance.abs())
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(k);
        ranked
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskModel {
    fitted: Option<FittedModel>,
    seed: Option<u64>,
}

impl RiskModel {
    /// A model that refuses to predict until trained or loaded.
    pub fn untrained() -> Self {
        Self::default()
    }

    #[instrument(skip(source, params))]
    pub fn train(
        source: &dyn TrainingSource,
        samples: usize,
        seed: u64,
        params: TrainParams,
    ) -> Result<Self> {
        let dataset = source.generate(samples, seed);
        if dataset.width() != FEATURE_NAMES.len() {
            return Err(EngineError::InvalidDataset(format!(
                "risk model expects {} features, source provides {}",
                FEATURE_NAMES.len(),
                dataset.width()
            )));
        }
        let fitted = FittedModel::train(&dataset, params)?;
        info!(samples, seed, "risk model trained");
        Ok(Self {
            fitted: Some(fitted),
            seed: Some(seed),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn predict(&self, features: &[f64; 6]) -> Result<RiskPrediction> {
        let fitted = self.fitted.as_ref().ok_or(EngineError::ModelNotReady {
            model: RISK_MODEL_NAME,
        })?;
        let (risk, attributions) = fitted.predict_with_attribution(features);
        let explanations = FEATURE_NAMES
            .iter()
            .zip(features.iter().zip(attributions))
            .map(|(name, (value, importance))| FeatureExplanation {
                feature: name.to_string(),
                value: *value,
                importance,
            })
            .collect();
        Ok(RiskPrediction { risk, explanations })
    }

    pub fn predict_sample(&self, sample: &VitalsSample) -> Result<RiskPrediction> {
        self.predict(&sample.features())
    }

    pub fn to_artifact(&self) -> Result<ModelArtifact> {
        let fitted = self.fitted.as_ref().ok_or(EngineError::ModelNotReady {
            model: RISK_MODEL_NAME,
        })?;
        Ok(ModelArtifact::new(RISK_MODEL_NAME, fitted.clone(), self.seed))
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        artifact.check(RISK_MODEL_NAME, &FEATURE_NAMES)?;
        Ok(Self {
            seed: artifact.seed,
            fitted: Some(artifact.fitted),
        })
    }
}

/// Short clinical narrative for a forecast.
pub fn clinical_reasoning(latest: &VitalsSample, prediction: &RiskPrediction) -> String {
    let mut parts: Vec<String> = Vec::new();

    if latest.map < 70.0 {
        parts.push("Current MAP is below optimal range".to_string());
    }
    if latest.heart_rate > 90.0 {
        parts.push("elevated heart rate suggests compensation".to_string());
    }
    if latest.spo2 < 96.0 {
        parts.push("oxygen saturation indicates potential respiratory compromise".to_string());
    }

    for factor in prediction.top_k(2) {
        if factor.importance > 0.1 {
            parts.push(format!("{} is contributing to increased risk", factor.feature));
        }
    }

    if prediction.risk > 0.6 {
        parts.push("Consider preemptive intervention".to_string());
    }

    if parts.is_empty() {
        "No concerning findings.".to_string()
    } else {
        format!("{}.", parts.join(". "))
    }
}
