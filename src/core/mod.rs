pub mod clock;
pub mod data;
pub mod dataset;
pub mod dosage;
pub mod events;
pub mod forecast;
pub mod ml;
pub mod risk;
pub mod sepsis;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use data::{SyntheticFeed, VitalsFeed};
pub use dataset::{SyntheticHypotensionSource, SyntheticSepsisSource, TrainingSource};
pub use dosage::{DosageCalculator, DrugCategory, DrugProfile, InteractionChecker};
pub use events::EventDetector;
pub use forecast::ForecastEngine;
pub use risk::{RiskModel, RiskPrediction};
pub use sepsis::SepsisAssessor;
pub use window::VitalsWindow;
