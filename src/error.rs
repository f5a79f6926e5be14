//! Error taxonomy for the clinical inference engine.
//!
//! Missing lab values never fail a request: the sepsis assessor substitutes
//! defaults instead.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No vitals have been recorded yet. Recoverable: retry once the feed delivers.
    #[error("no vitals data available")]
    EmptyWindow,

    /// Inference was requested before training or loading completed.
    #[error("{model} model is not ready")]
    ModelNotReady { model: &'static str },

    #[error("drug {name} not found in database")]
    UnknownDrug { name: String },

    #[error("sample at {got} is not after the latest retained sample at {last}")]
    OutOfOrderSample {
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("unsupported vitals type for forecast: {0}")]
    UnsupportedVitalsType(String),

    #[error("invalid training dataset: {0}")]
    InvalidDataset(String),

    #[error("model artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
