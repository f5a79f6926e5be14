//! Replaceable numeric model: per-feature standardization followed by a
//! logistic regressor trained with deterministic full-batch gradient descent.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Labeled training data. Labels are 0.0 or 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl Dataset {
    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(EngineError::InvalidDataset("no rows".to_string()));
        }
        if self.features.len() != self.labels.len() {
            return Err(EngineError::InvalidDataset(format!(
                "{} feature rows but {} labels",
                self.features.len(),
                self.labels.len()
            )));
        }
        if let Some(row) = self.features.iter().find(|row| row.len() != self.width()) {
            return Err(EngineError::InvalidDataset(format!(
                "row has {} features, expected {}",
                row.len(),
                self.width()
            )));
        }
        Ok(())
    }
}

/// Zero-mean, unit-variance scaling per feature (population variance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>], width: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; width];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = x - m;
                *v += d * d;
            }
        }
        let std = var.into_iter().map(|v| (v / n).sqrt()).collect();

        Self { mean, std }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| if *s == 0.0 { 0.0 } else { (x - m) / s })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            epochs: 400,
            learning_rate: 0.5,
            l2: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    /// Fits on already-scaled rows. Iteration order is fixed, so the same
    /// data always produces the same parameters.
    pub fn fit(rows: &[Vec<f64>], labels: &[f64], params: TrainParams) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;
        let mut weights = vec![0.0; width];
        let mut bias = 0.0;

        for _ in 0..params.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;

            for (row, y) in rows.iter().zip(labels) {
                let diff = sigmoid(dot(&weights, row) + bias) - y;
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += diff * x;
                }
                grad_b += diff;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            bias -= params.learning_rate * grad_b / n;
        }

        Self { weights, bias }
    }

    pub fn logit(&self, scaled: &[f64]) -> f64 {
        dot(&self.weights, scaled) + self.bias
    }

    pub fn predict_proba(&self, scaled: &[f64]) -> f64 {
        let p = sigmoid(self.logit(scaled));
        if p.is_nan() {
            0.5
        } else {
            p.clamp(0.0, 1.0)
        }
    }

    /// Output for an all-mean input.
    pub fn baseline(&self) -> f64 {
        sigmoid(self.bias)
    }

    /// Additive attribution in probability space: each feature receives its
    /// share of the logit displacement, scaled to `p - baseline`. The values
    /// sum to `p - baseline` and are all zero when the displacement is zero.
    pub fn attribute(&self, scaled: &[f64]) -> Vec<f64> {
        let terms: Vec<f64> = self.weights.iter().zip(scaled).map(|(w, z)| w * z).collect();
        let displacement: f64 = terms.iter().sum();
        if displacement == 0.0 || !displacement.is_finite() {
            return vec![0.0; terms.len()];
        }
        let delta = self.predict_proba(scaled) - self.baseline();
        terms.iter().map(|t| t / displacement * delta).collect()
    }
}

/// Scaler and regressor trained together on one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub model: LogisticModel,
}

impl FittedModel {
    pub fn train(dataset: &Dataset, params: TrainParams) -> Result<Self> {
        dataset.validate()?;
        let scaler = StandardScaler::fit(&dataset.features, dataset.width());
        let scaled: Vec<Vec<f64>> = dataset.features.iter().map(|r| scaler.transform(r)).collect();
        let model = LogisticModel::fit(&scaled, &dataset.labels, params);
        Ok(Self {
            feature_names: dataset.feature_names.clone(),
            scaler,
            model,
        })
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.model.predict_proba(&self.scaler.transform(features))
    }

    pub fn predict_with_attribution(&self, features: &[f64]) -> (f64, Vec<f64>) {
        let scaled = self.scaler.transform(features);
        (self.model.predict_proba(&scaled), self.model.attribute(&scaled))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
