//! Patient-adjusted dosing with allergy and interaction screening.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, Result};
use crate::models::{DrugDosageRecommendation, PatientProfile, VitalsSample};

/// Placeholder confidence attached to every recommendation.
pub const DOSAGE_CONFIDENCE: f64 = 0.88;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrugCategory {
    Anesthetic,
    Sedative,
    Opioid,
    Vasopressor,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugProfile {
    pub name: String,
    pub category: DrugCategory,
    pub base_dose: f64,
    pub unit: String,
    pub max_dose: f64,
    pub max_dose_unit: String,
    pub route: String,
    /// Hours.
    pub half_life: f64,
    pub contraindications: Vec<String>,
    pub monitoring: Vec<String>,
}

impl DrugProfile {
    #[allow(clippy::too_many_arguments)]
    fn new(
        name: &str,
        category: DrugCategory,
        base_dose: f64,
        unit: &str,
        max_dose: f64,
        max_dose_unit: &str,
        half_life: f64,
        contraindications: &[&str],
        monitoring: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            base_dose,
            unit: unit.to_string(),
            max_dose,
            max_dose_unit: max_dose_unit.to_string(),
            route: "IV".to_string(),
            half_life,
            contraindications: contraindications.iter().map(|s| s.to_string()).collect(),
            monitoring: monitoring.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `None` when the maximum is recorded in a different unit than the dose.
    pub fn exceeds_max(&self, dose: f64) -> Option<bool> {
        (self.unit == self.max_dose_unit).then(|| dose > self.max_dose)
    }
}

/// Perioperative drugs keyed by lowercase name.
pub fn default_drug_table() -> HashMap<String, DrugProfile> {
    use DrugCategory::*;

    [
        DrugProfile::new(
            "propofol",
            Anesthetic,
            2.0,
            "mg/kg",
            200.0,
            "mcg/kg/min",
            0.5,
            &["egg allergy", "soy allergy"],
            &["BP", "HR", "BIS", "consciousness level"],
        ),
        DrugProfile::new(
            "midazolam",
            Sedative,
            0.02,
            "mg/kg",
            0.1,
            "mg/kg",
            2.0,
            &["severe respiratory depression"],
            &["respiratory rate", "consciousness level"],
        ),
        DrugProfile::new(
            "fentanyl",
            Opioid,
            2.0,
            "mcg/kg",
            20.0,
            "mcg/kg",
            3.5,
            &["severe respiratory depression"],
            &["respiratory rate", "pain score", "consciousness"],
        ),
        DrugProfile::new(
            "norepinephrine",
            Vasopressor,
            0.1,
            "mcg/kg/min",
            3.0,
            "mcg/kg/min",
            0.033,
            &["uncorrected hypovolemia"],
            &["MAP", "HR", "urine output", "perfusion"],
        ),
        DrugProfile::new(
            "phenylephrine",
            Vasopressor,
            1.0,
            "mcg/kg/min",
            10.0,
            "mcg/kg/min",
            0.05,
            &["severe CAD"],
            &["MAP", "HR"],
        ),
    ]
    .into_iter()
    .map(|profile| (profile.name.to_lowercase(), profile))
    .collect()
}

/// Screens a drug against the patient's current medications.
#[cfg_attr(test, mockall::automock)]
pub trait InteractionChecker: Send + Sync {
    fn check(&self, drug: &DrugProfile, current_medications: &[String]) -> Vec<String>;
}

/// Reports no interactions. Stands in until an interaction knowledge base
/// is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInteractionChecker;

impl InteractionChecker for NoInteractionChecker {
    fn check(&self, _drug: &DrugProfile, _current_medications: &[String]) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Adjustment {
    factor: f64,
    reason: String,
}

fn patient_adjustments(patient: &PatientProfile, drug: &DrugProfile) -> Vec<Adjustment> {
    let mut adjustments = Vec::new();

    if patient.age > 65 {
        adjustments.push(Adjustment {
            factor: 0.8,
            reason: format!("Reduced 20% for elderly patient (age {})", patient.age),
        });
    }
    if patient.age < 18 {
        adjustments.push(Adjustment {
            factor: 1.2,
            reason: format!("Increased 20% for pediatric patient (age {})", patient.age),
        });
    }
    if let Some(egfr) = patient.kidney_function {
        if egfr < 60.0 && matches!(drug.category, DrugCategory::Opioid | DrugCategory::Sedative) {
            adjustments.push(Adjustment {
                factor: 0.7,
                reason: format!("Reduced 30% for renal impairment (eGFR {egfr:.0})"),
            });
        }
    }
    if let Some(liver) = patient.liver_function {
        if liver.is_impaired() && drug.category == DrugCategory::Anesthetic {
            adjustments.push(Adjustment {
                factor: 0.6,
                reason: format!("Reduced 40% for hepatic impairment ({liver:?})"),
            });
        }
    }

    adjustments
}

fn clinical_adjustment(vitals: &VitalsSample, drug: &DrugProfile) -> Option<Adjustment> {
    match drug.category {
        DrugCategory::Vasopressor if vitals.map < 55.0 => Some(Adjustment {
            factor: 1.5,
            reason: format!("Increased 50% for severe hypotension (MAP {:.0})", vitals.map),
        }),
        DrugCategory::Vasopressor if vitals.map < 65.0 => Some(Adjustment {
            factor: 1.2,
            reason: format!("Increased 20% for hypotension (MAP {:.0})", vitals.map),
        }),
        DrugCategory::Anesthetic if vitals.heart_rate > 100.0 => Some(Adjustment {
            factor: 0.9,
            reason: format!("Reduced 10% for tachycardia (HR {:.0})", vitals.heart_rate),
        }),
        _ => None,
    }
}

fn frequency_and_duration(category: DrugCategory) -> (&'static str, &'static str) {
    match category {
        DrugCategory::Anesthetic => ("Continuous infusion", "Duration of procedure"),
        DrugCategory::Vasopressor => ("Continuous infusion", "Until MAP >65 mmHg"),
        DrugCategory::Sedative | DrugCategory::Opioid => ("PRN q2-4h", "As needed"),
        DrugCategory::Other => ("As directed", "As clinically indicated"),
    }
}

pub struct DosageCalculator {
    drugs: HashMap<String, DrugProfile>,
    interactions: Box<dyn InteractionChecker>,
}

impl fmt::Debug for DosageCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DosageCalculator")
            .field("drugs", &self.drugs.len())
            .finish_non_exhaustive()
    }
}

impl Default for DosageCalculator {
    fn default() -> Self {
        Self::new(default_drug_table(), Box::new(NoInteractionChecker))
    }
}

impl DosageCalculator {
    /// Table keys are normalized to lowercase.
    pub fn new(
        drugs: HashMap<String, DrugProfile>,
        interactions: Box<dyn InteractionChecker>,
    ) -> Self {
        let drugs = drugs
            .into_iter()
            .map(|(name, profile)| (name.to_lowercase(), profile))
            .collect();
        Self {
            drugs,
            interactions,
        }
    }

    pub fn with_interaction_checker(mut self, checker: Box<dyn InteractionChecker>) -> Self {
        self.interactions = checker;
        self
    }

    pub fn profile(&self, drug: &str) -> Option<&DrugProfile> {
        self.drugs.get(&drug.to_lowercase())
    }

    pub fn drug_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drugs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[instrument(skip(self, patient, vitals))]
    pub fn calculate_dosage(
        &self,
        drug: &str,
        patient: &PatientProfile,
        indication: &str,
        vitals: &VitalsSample,
    ) -> Result<DrugDosageRecommendation> {
        let profile = self.profile(drug).ok_or_else(|| EngineError::UnknownDrug {
            name: drug.to_string(),
        })?;

        let mut adjustments = patient_adjustments(patient, profile);
        adjustments.extend(clinical_adjustment(vitals, profile));
        let dose = adjustments
            .iter()
            .fold(profile.base_dose, |dose, adj| dose * adj.factor);
        debug!(adjustments = adjustments.len(), dose, "dose adjusted");

        let exceeds_max_dose = profile.exceeds_max(dose).unwrap_or(false);
        if exceeds_max_dose {
            warn!(dose, max = profile.max_dose, "computed dose exceeds recorded maximum");
        }

        let contraindications = self.contraindications(profile, patient);
        let (frequency, duration) = frequency_and_duration(profile.category);

        let mut rationale = vec![format!(
            "Base dose for {} ({}): {:.3} {}",
            drug, indication, profile.base_dose, profile.unit
        )];
        rationale.extend(adjustments.into_iter().map(|adj| adj.reason));
        rationale.push(format!("Final dose: {:.3} {}", dose, profile.unit));
        if exceeds_max_dose {
            rationale.push(format!(
                "Exceeds recorded maximum of {} {} (advisory, not clamped)",
                profile.max_dose, profile.max_dose_unit
            ));
        }

        Ok(DrugDosageRecommendation {
            drug_name: drug.to_string(),
            recommended_dose: dose,
            dose_unit: profile.unit.clone(),
            route: profile.route.clone(),
            frequency: frequency.to_string(),
            duration: duration.to_string(),
            contraindications,
            monitoring_parameters: profile.monitoring.clone(),
            exceeds_max_dose,
            confidence: DOSAGE_CONFIDENCE,
            rationale: rationale.join(". "),
        })
    }

    fn contraindications(&self, profile: &DrugProfile, patient: &PatientProfile) -> Vec<String> {
        let mut found: Vec<String> = patient
            .allergies
            .iter()
            .filter(|allergy| {
                profile
                    .contraindications
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(allergy))
            })
            .map(|allergy| format!("Allergy to {allergy}"))
            .collect();

        for interaction in self
            .interactions
            .check(profile, &patient.current_medications)
        {
            if !found.contains(&interaction) {
                found.push(interaction);
            }
        }
        found
    }
}
