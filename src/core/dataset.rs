//! Seedable training-data sources. Each source owns the clinical
//! distribution it samples from; the numeric model never generates data.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::core::ml::Dataset;
use crate::models::FEATURE_NAMES;

pub const SEPSIS_FEATURE_NAMES: [&str; 9] = [
    "temperature",
    "heart_rate",
    "respiratory_rate",
    "wbc_count",
    "systolic_bp",
    "map",
    "lactate",
    "age",
    "is_male",
];

pub trait TrainingSource: Send + Sync {
    fn feature_names(&self) -> Vec<String>;

    /// Draws `n` labeled rows. Same `(n, seed)` always yields the same rows.
    fn generate(&self, n: usize, seed: u64) -> Dataset;
}

fn gauss<R: Rng>(rng: &mut R, mean: f64, std: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + std * z
}

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

/// Intraoperative vitals with independent Gaussian channels. A row is
/// positive when MAP < 70, HR > 100 or SpO2 < 96.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticHypotensionSource;

impl SyntheticHypotensionSource {
    const MEAN: [f64; 6] = [75.0, 80.0, 98.0, 16.0, 36.5, 35.0];
    const STD: [f64; 6] = [10.0, 20.0, 2.0, 4.0, 1.0, 5.0];
}

impl TrainingSource for SyntheticHypotensionSource {
    fn feature_names(&self) -> Vec<String> {
        names(&FEATURE_NAMES)
    }

    fn generate(&self, n: usize, seed: u64) -> Dataset {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut features = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);

        for _ in 0..n {
            let row: Vec<f64> = Self::MEAN
                .iter()
                .zip(Self::STD.iter())
                .map(|(m, s)| gauss(&mut rng, *m, *s))
                .collect();
            let positive = row[0] < 70.0 || row[1] > 100.0 || row[2] < 96.0;
            labels.push(if positive { 1.0 } else { 0.0 });
            features.push(row);
        }

        Dataset {
            feature_names: self.feature_names(),
            features,
            labels,
        }
    }
}

/// Septic and non-septic presentations at a fixed prevalence.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSepsisSource {
    pub prevalence: f64,
}

impl Default for SyntheticSepsisSource {
    fn default() -> Self {
        Self { prevalence: 0.3 }
    }
}

impl TrainingSource for SyntheticSepsisSource {
    fn feature_names(&self) -> Vec<String> {
        names(&SEPSIS_FEATURE_NAMES)
    }

    fn generate(&self, n: usize, seed: u64) -> Dataset {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut features = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);

        for _ in 0..n {
            let age = rng.gen_range(20.0..90.0);
            let is_male = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
            let septic = rng.gen::<f64>() < self.prevalence;

            let row = if septic {
                let temp = if rng.gen_bool(0.5) {
                    gauss(&mut rng, 38.5, 0.5)
                } else {
                    gauss(&mut rng, 35.5, 0.5)
                };
                let hr = gauss(&mut rng, 110.0, 15.0);
                let rr = gauss(&mut rng, 25.0, 5.0);
                let wbc = if rng.gen_bool(0.5) {
                    gauss(&mut rng, 15.0, 3.0)
                } else {
                    gauss(&mut rng, 3.0, 0.5)
                };
                let sbp = gauss(&mut rng, 85.0, 10.0);
                let map = gauss(&mut rng, 55.0, 8.0);
                let lactate = gauss(&mut rng, 3.5, 1.0);
                vec![temp, hr, rr, wbc, sbp, map, lactate, age, is_male]
            } else {
                let temp = gauss(&mut rng, 36.8, 0.3);
                let hr = gauss(&mut rng, 75.0, 10.0);
                let rr = gauss(&mut rng, 16.0, 3.0);
                let wbc = gauss(&mut rng, 7.0, 2.0);
                let sbp = gauss(&mut rng, 120.0, 15.0);
                let map = gauss(&mut rng, 80.0, 10.0);
                let lactate = gauss(&mut rng, 1.5, 0.5);
                vec![temp, hr, rr, wbc, sbp, map, lactate, age, is_male]
            };

            labels.push(if septic { 1.0 } else { 0.0 });
            features.push(row);
        }

        Dataset {
            feature_names: self.feature_names(),
            features,
            labels,
        }
    }
}
