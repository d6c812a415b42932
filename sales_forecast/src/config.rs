//! Pipeline configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `STORE_FORECAST__` environment variables (`__` separates nested keys, e.g.
//! `STORE_FORECAST__MODEL__RIDGE=0.01`). The binary applies CLI overrides on
//! top of the loaded value.

use crate::error::{ForecastError, Result};
use crate::frame::DEFAULT_HORIZON_DAYS;
use crate::models::AdditiveRegression;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "STORE_FORECAST__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// FeatureTable CSV
    pub features_path: PathBuf,
    /// Directory receiving all output artifacts
    pub output_dir: PathBuf,
    pub horizon_days: usize,
    /// Threads used for the entity loop
    pub workers: usize,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub weekly_order: usize,
    pub ridge: f64,
    pub min_observations: usize,
    pub dense_history: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features_path: PathBuf::from("data/processed/features_daily.csv"),
            output_dir: PathBuf::from("output"),
            horizon_days: DEFAULT_HORIZON_DAYS,
            workers: 1,
            model: ModelConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weekly_order: 3,
            ridge: 1e-3,
            min_observations: 3,
            dense_history: false,
        }
    }
}

impl PipelineConfig {
    /// Load defaults, then `path` if given, then the environment
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ForecastError::ConfigError(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: PipelineConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon_days must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ForecastError::InvalidParameter(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.model.min_observations == 0 {
            return Err(ForecastError::InvalidParameter(
                "model.min_observations must be at least 1".to_string(),
            ));
        }
        if !self.model.ridge.is_finite() || self.model.ridge < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "model.ridge must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.output_dir.join("predictions_daily.csv")
    }

    pub fn components_path(&self) -> PathBuf {
        self.output_dir.join("prophet_components.csv")
    }

    pub fn accuracy_path(&self) -> PathBuf {
        self.output_dir.join("accuracy_report.csv")
    }

    pub fn failures_path(&self) -> PathBuf {
        self.output_dir.join("forecast_failures.json")
    }
}

impl ModelConfig {
    pub fn build(&self) -> Result<AdditiveRegression> {
        Ok(
            AdditiveRegression::new(self.weekly_order, self.ridge, self.min_observations)?
                .with_dense_history(self.dense_history),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.horizon_days, 30);
        assert_eq!(config.workers, 1);
        assert!(config.validate().is_ok());
        assert!(config.model.build().is_ok());
        assert_eq!(config.accuracy_path(), PathBuf::from("output/accuracy_report.csv"));
    }

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "forecast.toml",
                r#"
                    output_dir = "out"
                    workers = 2

                    [model]
                    ridge = 0.5
                "#,
            )?;
            jail.set_env("STORE_FORECAST__WORKERS", "4");
            jail.set_env("STORE_FORECAST__MODEL__DENSE_HISTORY", "true");

            let config = PipelineConfig::load(Some(Path::new("forecast.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.output_dir, PathBuf::from("out"));
            assert_eq!(config.workers, 4);
            assert_eq!(config.model.ridge, 0.5);
            assert!(config.model.dense_history);
            assert_eq!(config.model.weekly_order, 3);
            assert_eq!(config.horizon_days, 30);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("STORE_FORECAST__HORIZON_DAYS", "0");
            let err = PipelineConfig::load(None).unwrap_err();
            assert!(matches!(err, ForecastError::InvalidParameter(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_config_file() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/forecast.toml"))).unwrap_err();
        assert!(matches!(err, ForecastError::ConfigError(_)));
    }
}
