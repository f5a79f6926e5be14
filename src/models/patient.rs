use serde::{Deserialize, Serialize};

/// White-cell count assumed when no lab result is supplied (x10^9/L).
pub const DEFAULT_WBC: f64 = 7.0;
/// Lactate assumed when no lab result is supplied (mmol/L).
pub const DEFAULT_LACTATE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "U")]
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiverFunction {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl LiverFunction {
    pub fn is_impaired(self) -> bool {
        matches!(self, LiverFunction::Moderate | LiverFunction::Severe)
    }
}

/// Per-request patient context. Never retained by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub age: u32,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub gender: Gender,
    #[serde(default)]
    pub comorbidities: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    /// eGFR, mL/min/1.73m2
    #[serde(default)]
    pub kidney_function: Option<f64>,
    #[serde(default)]
    pub liver_function: Option<LiverFunction>,
}

impl PatientProfile {
    pub fn new(age: u32, weight_kg: f64, height_cm: f64, gender: Gender) -> Self {
        Self {
            age,
            weight_kg,
            height_cm,
            gender,
            comorbidities: Vec::new(),
            current_medications: Vec::new(),
            allergies: Vec::new(),
            kidney_function: None,
            liver_function: None,
        }
    }

    pub fn is_male(&self) -> bool {
        self.gender == Gender::Male
    }
}

/// Sparse lab panel. Absent values fall back to [`DEFAULT_WBC`] and
/// [`DEFAULT_LACTATE`] for model input; an absent WBC never fires the SIRS
/// white-cell criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabValues {
    #[serde(default)]
    pub wbc: Option<f64>,
    #[serde(default)]
    pub lactate: Option<f64>,
}

impl LabValues {
    pub fn wbc_or_default(&self) -> f64 {
        self.wbc.unwrap_or(DEFAULT_WBC)
    }

    pub fn lactate_or_default(&self) -> f64 {
        self.lactate.unwrap_or(DEFAULT_LACTATE)
    }
}
