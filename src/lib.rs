//! OR-BIT clinical inference engine
//!
//! Streams intraoperative vitals into a bounded window, flags threshold
//! events, forecasts short-horizon trajectories with hypotension risk,
//! screens for sepsis and computes patient-adjusted drug doses.

pub mod core;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;

pub use engine::{ClinicalEngine, EngineStats, PatientSummary};
pub use error::{EngineError, Result};

/// Engine configuration
pub mod config {
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};

    use crate::core::ml::TrainParams;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct EngineConfig {
        pub window: WindowConfig,
        pub forecast: ForecastConfig,
        pub models: ModelConfig,
        pub feed: FeedConfig,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct WindowConfig {
        pub retention_minutes: i64,
        /// 0 disables the count cap.
        pub max_samples: usize,
    }

    impl Default for WindowConfig {
        fn default() -> Self {
            Self {
                retention_minutes: 120,
                max_samples: 1000,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ForecastConfig {
        pub step_minutes: i64,
        pub default_duration_minutes: i64,
        pub max_steps: usize,
        /// Fixed seed for reproducible trajectories.
        pub seed: Option<u64>,
    }

    impl Default for ForecastConfig {
        fn default() -> Self {
            Self {
                step_minutes: 5,
                default_duration_minutes: 30,
                max_steps: 24,
                seed: None,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ModelConfig {
        pub seed: u64,
        pub risk_samples: usize,
        pub sepsis_samples: usize,
        pub epochs: usize,
        pub learning_rate: f64,
        pub l2: f64,
        /// Where trained artifacts are loaded from and saved to.
        pub artifact_dir: Option<PathBuf>,
    }

    impl Default for ModelConfig {
        fn default() -> Self {
            Self {
                seed: 42,
                risk_samples: 1000,
                sepsis_samples: 5000,
                epochs: 400,
                learning_rate: 0.5,
                l2: 1e-3,
                artifact_dir: None,
            }
        }
    }

    impl ModelConfig {
        pub fn train_params(&self) -> TrainParams {
            TrainParams {
                epochs: self.epochs,
                learning_rate: self.learning_rate,
                l2: self.l2,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct FeedConfig {
        pub interval_ms: u64,
        pub seed: Option<u64>,
    }

    impl Default for FeedConfig {
        fn default() -> Self {
            Self {
                interval_ms: 3000,
                seed: None,
            }
        }
    }

    /// Load configuration from `config/`
    pub fn load_config() -> Result<EngineConfig, config::ConfigError> {
        dotenv::dotenv().ok();
        let env = std::env::var("ORBIT_ENV").unwrap_or_else(|_| "development".into());
        load_config_from(Path::new("config"), &env)
    }

    /// Layers `<dir>/default`, then `<dir>/<env>`, then `ORBIT__*` variables
    /// over the built-in defaults. Both files are optional.
    pub fn load_config_from(dir: &Path, env: &str) -> Result<EngineConfig, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(dir.join("default")).required(false))
            .add_source(config::File::from(dir.join(env)).required(false))
            .add_source(
                config::Environment::with_prefix("ORBIT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        settings.try_deserialize()
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use pretty_assertions::assert_eq;
        use std::fs;

        #[test]
        fn test_missing_files_fall_back_to_defaults() {
            let dir = tempfile::tempdir().unwrap();
            let config = load_config_from(dir.path(), "test").unwrap();
            assert_eq!(config, EngineConfig::default());
        }

        #[test]
        fn test_env_file_overrides_default_file() {
            let dir = tempfile::tempdir().unwrap();
            fs::write(
                dir.path().join("default.toml"),
                "[window]\nretention_minutes = 60\n\n[forecast]\nseed = 7\n",
            )
            .unwrap();
            fs::write(
                dir.path().join("staging.toml"),
                "[window]\nretention_minutes = 30\n\n[models]\nepochs = 50\n",
            )
            .unwrap();

            let config = load_config_from(dir.path(), "staging").unwrap();
            assert_eq!(config.window.retention_minutes, 30);
            assert_eq!(config.window.max_samples, 1000);
            assert_eq!(config.forecast.seed, Some(7));
            assert_eq!(config.models.train_params().epochs, 50);
            assert_eq!(config.models.seed, 42);
        }
    }
}
