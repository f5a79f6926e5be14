use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::dataset::{SyntheticHypotensionSource, SyntheticSepsisSource, TrainingSource};
use crate::core::dosage::DosageCalculator;
use crate::core::events::EventDetector;
use crate::core::forecast::{ForecastEngine, FORECAST_CONFIDENCE};
use crate::core::risk::{clinical_reasoning, RiskModel, RISK_MODEL_NAME};
use crate::core::sepsis::{SepsisAssessor, SEPSIS_MODEL_NAME};
use crate::core::window::VitalsWindow;
use crate::error::{EngineError, Result};
use crate::models::{
    ClinicalEvent, DrugDosageRecommendation, LabValues, PatientProfile, RiskAssessment,
    RiskLevel, SepsisRiskAssessment, Severity, VitalsSample, VitalsType,
};
use crate::store::{ArtifactStore, ModelArtifact};

/// Samples considered for the MAP trend in [`PatientSummary`].
const TREND_SAMPLES: usize = 20;
/// Events considered for active alerts in [`PatientSummary`].
const ALERT_EVENTS: usize = 10;
/// MAP change (mmHg) beyond which the trend is no longer stable.
const TREND_THRESHOLD: f64 = 5.0;

// ===== Summary Models =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientStatus {
    Stable,
    Unstable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub status: PatientStatus,
    pub latest: VitalsSample,
    pub map_trend: Trend,
    pub active_alerts: usize,
    pub session_duration_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub vitals_count: usize,
    pub events_count: usize,
    pub risk_model_ready: bool,
    pub sepsis_model_ready: bool,
}

// ===== Engine =====

/// Owns the vitals window and model handles. Share it behind an `Arc`;
/// every operation takes `&self`.
pub struct ClinicalEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    window: RwLock<VitalsWindow>,
    detector: EventDetector,
    risk_model: RwLock<Option<Arc<RiskModel>>>,
    sepsis_model: RwLock<Option<Arc<SepsisAssessor>>>,
    dosage: DosageCalculator,
    forecaster: ForecastEngine,
    rng: Mutex<ChaCha8Rng>,
    store: Option<ArtifactStore>,
    hypotension_source: Box<dyn TrainingSource>,
    sepsis_source: Box<dyn TrainingSource>,
}

impl std::fmt::Debug for ClinicalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicalEngine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ClinicalEngine {
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.forecast.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            clock: Arc::new(SystemClock),
            window: RwLock::new(VitalsWindow::from_config(&config.window)),
            detector: EventDetector::new(),
            risk_model: RwLock::new(None),
            sepsis_model: RwLock::new(None),
            dosage: DosageCalculator::default(),
            forecaster: ForecastEngine::from_config(&config.forecast),
            rng: Mutex::new(rng),
            store: config.models.artifact_dir.clone().map(ArtifactStore::new),
            hypotension_source: Box::new(SyntheticHypotensionSource),
            sepsis_source: Box::new(SyntheticSepsisSource::default()),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_dosage_calculator(mut self, dosage: DosageCalculator) -> Self {
        self.dosage = dosage;
        self
    }

    pub fn with_training_sources(
        mut self,
        hypotension: Box<dyn TrainingSource>,
        sepsis: Box<dyn TrainingSource>,
    ) -> Self {
        self.hypotension_source = hypotension;
        self.sepsis_source = sepsis;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dosage_calculator(&self) -> &DosageCalculator {
        &self.dosage
    }

    // ===== Model Lifecycle =====

    /// Loads valid artifacts from the artifact directory and trains (then
    /// saves) whatever is missing or stale.
    #[instrument(skip(self))]
    pub fn initialize_models(&self) -> Result<()> {
        let seed = self.config.models.seed;

        let risk = match self.load_artifact(RISK_MODEL_NAME, RiskModel::from_artifact) {
            Some(model) => model,
            None => {
                let model = self.train_risk(seed)?;
                self.save_artifact(&model.to_artifact()?)?;
                model
            }
        };
        *self.risk_model.write() = Some(Arc::new(risk));

        let sepsis = match self.load_artifact(SEPSIS_MODEL_NAME, SepsisAssessor::from_artifact) {
            Some(model) => model,
            None => {
                let model = self.train_sepsis(seed)?;
                self.save_artifact(&model.to_artifact())?;
                model
            }
        };
        *self.sepsis_model.write() = Some(Arc::new(sepsis));

        info!("models initialized");
        Ok(())
    }

    /// Trains both models from scratch, ignoring stored artifacts, and swaps
    /// them in. In-flight requests finish on the previous models.
    #[instrument(skip(self))]
    pub fn retrain(&self, seed: Option<u64>) -> Result<()> {
        let seed = seed.unwrap_or(self.config.models.seed);

        let risk = self.train_risk(seed)?;
        let sepsis = self.train_sepsis(seed)?;
        self.save_artifact(&risk.to_artifact()?)?;
        self.save_artifact(&sepsis.to_artifact())?;

        *self.risk_model.write() = Some(Arc::new(risk));
        *self.sepsis_model.write() = Some(Arc::new(sepsis));
        info!(seed, "models retrained");
        Ok(())
    }

    fn train_risk(&self, seed: u64) -> Result<RiskModel> {
        RiskModel::train(
            self.hypotension_source.as_ref(),
            self.config.models.risk_samples,
            seed,
            self.config.models.train_params(),
        )
    }

    fn train_sepsis(&self, seed: u64) -> Result<SepsisAssessor> {
        SepsisAssessor::train(
            self.sepsis_source.as_ref(),
            self.config.models.sepsis_samples,
            seed,
            self.config.models.train_params(),
        )
    }

    fn load_artifact<T>(
        &self,
        model: &str,
        restore: impl FnOnce(ModelArtifact) -> Result<T>,
    ) -> Option<T> {
        let store = self.store.as_ref()?;
        match store.load(model).and_then(|artifact| artifact.map(restore).transpose()) {
            Ok(Some(restored)) => {
                info!(model, "model loaded from artifact");
                Some(restored)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(model, error = %err, "unusable model artifact, retraining");
                None
            }
        }
    }

    fn save_artifact(&self, artifact: &ModelArtifact) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(artifact)?;
        }
        Ok(())
    }

    fn risk_model(&self) -> Result<Arc<RiskModel>> {
        self.risk_model
            .read()
            .clone()
            .ok_or(EngineError::ModelNotReady {
                model: RISK_MODEL_NAME,
            })
    }

    fn sepsis_model(&self) -> Result<Arc<SepsisAssessor>> {
        self.sepsis_model
            .read()
            .clone()
            .ok_or(EngineError::ModelNotReady {
                model: SEPSIS_MODEL_NAME,
            })
    }

    // ===== Vitals =====

    /// Appends a sample and returns the events it fired. Append, eviction
    /// and event recording happen under one write lock.
    #[instrument(skip(self, sample), fields(timestamp = %sample.timestamp))]
    pub fn append_vitals(&self, sample: VitalsSample) -> Result<Vec<ClinicalEvent>> {
        let events = self.detector.detect(&sample);
        let now = self.clock.now();
        {
            let mut window = self.window.write();
            if let Err(err) = window.append(sample, events.iter().cloned(), now) {
                warn!(error = %err, "vitals sample rejected");
                return Err(err);
            }
        }
        if !events.is_empty() {
            debug!(count = events.len(), "clinical events detected");
        }
        Ok(events)
    }

    pub fn latest_vitals(&self) -> Result<VitalsSample> {
        self.window.read().latest().cloned()
    }

    pub fn recent_vitals(&self, duration: Duration) -> Vec<VitalsSample> {
        self.window.read().recent(duration, self.clock.now())
    }

    pub fn recent_events(&self, duration: Duration) -> Vec<ClinicalEvent> {
        self.window.read().recent_events(duration, self.clock.now())
    }

    /// Clears vitals and event history. Models stay loaded.
    #[instrument(skip(self))]
    pub fn reset(&self) {
        self.window.write().clear();
        info!("vitals history cleared");
    }

    // ===== Inference =====

    /// Projects the latest sample forward and scores it for hypotension risk.
    /// `duration` defaults to the configured forecast horizon.
    #[instrument(skip(self))]
    pub fn forecast(&self, vitals_type: &str, duration: Option<Duration>) -> Result<RiskAssessment> {
        let target: VitalsType = vitals_type.parse()?;
        let latest = self.latest_vitals()?;
        let model = self.risk_model()?;

        let steps = duration
            .map(|d| self.forecaster.steps_for(d))
            .unwrap_or_else(|| self.forecaster.default_steps());
        let trajectory = {
            let mut rng = self.rng.lock();
            self.forecaster.project(&latest, steps, &mut *rng)
        };

        let prediction = model.predict_sample(&latest)?;
        let reason = clinical_reasoning(&latest, &prediction);
        let horizon = trajectory.last().map(|point| point.value_of(target));
        debug!(risk = prediction.risk, steps, ?horizon, %target, "forecast computed");

        Ok(RiskAssessment {
            target,
            trajectory,
            hypotension_risk: prediction.risk,
            risk_level: RiskLevel::from_probability(prediction.risk),
            explanations: prediction.explanations,
            reason,
            confidence: FORECAST_CONFIDENCE,
        })
    }

    #[instrument(skip_all)]
    pub fn assess_sepsis(
        &self,
        vitals: &VitalsSample,
        patient: &PatientProfile,
        labs: Option<&LabValues>,
    ) -> Result<SepsisRiskAssessment> {
        let assessment = self.sepsis_model()?.assess(vitals, patient, labs);
        info!(
            level = ?assessment.risk_level,
            score = assessment.risk_score,
            "sepsis assessment"
        );
        Ok(assessment)
    }

    /// [`assess_sepsis`](Self::assess_sepsis) against the latest sample.
    pub fn assess_sepsis_latest(
        &self,
        patient: &PatientProfile,
        labs: Option<&LabValues>,
    ) -> Result<SepsisRiskAssessment> {
        let latest = self.latest_vitals()?;
        self.assess_sepsis(&latest, patient, labs)
    }

    #[instrument(skip(self, patient, vitals))]
    pub fn calculate_dosage(
        &self,
        drug: &str,
        patient: &PatientProfile,
        indication: &str,
        vitals: &VitalsSample,
    ) -> Result<DrugDosageRecommendation> {
        self.dosage.calculate_dosage(drug, patient, indication, vitals)
    }

    // ===== Reporting =====

    pub fn patient_summary(&self) -> Result<PatientSummary> {
        let now = self.clock.now();
        let window = self.window.read();
        let latest = window.latest()?.clone();
        let started = window.first().map_or(latest.timestamp, |s| s.timestamp);

        let status = if latest.map > 65.0 && latest.spo2 > 95.0 {
            PatientStatus::Stable
        } else {
            PatientStatus::Unstable
        };
        let map_trend = map_trend(&window.tail(TREND_SAMPLES));
        let active_alerts = window
            .tail_events(ALERT_EVENTS)
            .iter()
            .filter(|e| e.severity == Severity::High)
            .count();

        Ok(PatientSummary {
            status,
            latest,
            map_trend,
            active_alerts,
            session_duration_secs: session_seconds(started, now),
        })
    }

    pub fn stats(&self) -> EngineStats {
        let window = self.window.read();
        EngineStats {
            vitals_count: window.len(),
            events_count: window.event_count(),
            risk_model_ready: self.risk_model.read().is_some(),
            sepsis_model_ready: self.sepsis_model.read().is_some(),
        }
    }
}

fn map_trend(samples: &[VitalsSample]) -> Trend {
    let change = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => last.map - first.map,
        _ => 0.0,
    };
    if change > TREND_THRESHOLD {
        Trend::Increasing
    } else if change < -TREND_THRESHOLD {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

fn session_seconds(started: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started).num_seconds().max(0)
}
