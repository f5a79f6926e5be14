//! Data model shared by the inference components.

pub mod assessment;
pub mod patient;
pub mod vitals;

pub use assessment::{
    DrugDosageRecommendation, FeatureExplanation, RiskAssessment, RiskLevel, SepsisRiskAssessment,
    SepsisRiskLevel, SirsCriteria, TrajectoryPoint, VitalsType,
};
pub use patient::{Gender, LabValues, LiverFunction, PatientProfile, DEFAULT_LACTATE, DEFAULT_WBC};
pub use vitals::{ClinicalEvent, EventKind, Severity, VitalsSample, FEATURE_NAMES};
