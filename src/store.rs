//! Versioned model artifacts: the only state the engine persists.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::ml::FittedModel;
use crate::error::{EngineError, Result};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model: String,
    pub seed: Option<u64>,
    pub trained_at: DateTime<Utc>,
    pub fitted: FittedModel,
}

impl ModelArtifact {
    pub fn new(model: &str, fitted: FittedModel, seed: Option<u64>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model: model.to_string(),
            seed,
            trained_at: Utc::now(),
            fitted,
        }
    }

    /// Rejects artifacts written by another format version, for another
    /// model, or with a different feature layout.
    pub fn check(&self, model: &str, feature_names: &[&str]) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(EngineError::Artifact(format!(
                "{} artifact has format version {}, expected {}",
                self.model, self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if self.model != model {
            return Err(EngineError::Artifact(format!(
                "expected {} artifact, found {}",
                model, self.model
            )));
        }
        let width = feature_names.len();
        let fitted = &self.fitted;
        if fitted.feature_names.iter().map(String::as_str).ne(feature_names.iter().copied())
            || fitted.scaler.mean.len() != width
            || fitted.scaler.std.len() != width
            || fitted.model.weights.len() != width
        {
            return Err(EngineError::Artifact(format!(
                "{} artifact feature layout does not match {:?}",
                model, feature_names
            )));
        }
        Ok(())
    }
}

/// Directory of `<model>.json` artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{model}.json"))
    }

    #[instrument(skip(self, artifact), fields(model = %artifact.model))]
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&artifact.model);
        fs::write(&path, serde_json::to_vec_pretty(artifact)?)?;
        info!(path = %path.display(), "model artifact saved");
        Ok(path)
    }

    /// `Ok(None)` when no artifact exists for `model`.
    #[instrument(skip(self))]
    pub fn load(&self, model: &str) -> Result<Option<ModelArtifact>> {
        let path = self.path_for(model);
        if !path.exists() {
            debug!(path = %path.display(), "no model artifact");
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
