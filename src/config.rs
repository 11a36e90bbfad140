//! Sweep configuration loaded from YAML.
//!
//! Ties the run identity (author, model, version), the resource and output
//! directories, the training parameters and the runner settings together.

use crate::balance::BalanceStrategy;
use crate::pairs::is_valid_version;
use crate::runner::{RunnerConfig, SweepRequest};
use crate::trainer::TrainingParameters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid balance mode: {0}")]
    InvalidBalanceMode(String),
}

/// Balancing mode as written in configuration files
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMode {
    /// Keep the first files in name order
    #[default]
    Prefix,
    /// Seeded random subset
    Seeded,
}

impl std::str::FromStr for BalanceMode {
    type Err = ConfigError;

    /// Parse balance mode from string
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBalanceMode` for unknown modes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prefix" | "first" => Ok(Self::Prefix),
            "seeded" | "random" => Ok(Self::Seeded),
            _ => Err(ConfigError::InvalidBalanceMode(s.to_string())),
        }
    }
}

/// Runner section of the configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Validation samples needed for an aggregate confusion matrix
    #[serde(default = "default_min_validation_samples")]
    pub min_validation_samples: u64,
    /// Balancing mode
    #[serde(default)]
    pub balance: BalanceMode,
    /// Seed for the `seeded` balancing mode
    #[serde(default = "default_balance_seed")]
    pub balance_seed: u64,
    /// Extension of written model artifacts
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
    /// Parent directory of the scratch area
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

const fn default_min_validation_samples() -> u64 {
    1
}
const fn default_balance_seed() -> u64 {
    42
}
fn default_artifact_extension() -> String {
    "mlmodel".to_string()
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            min_validation_samples: default_min_validation_samples(),
            balance: BalanceMode::default(),
            balance_seed: default_balance_seed(),
            artifact_extension: default_artifact_extension(),
            scratch_dir: None,
        }
    }
}

impl RunnerSettings {
    /// Balancing strategy selected by mode and seed
    #[must_use]
    pub const fn strategy(&self) -> BalanceStrategy {
        match self.balance {
            BalanceMode::Prefix => BalanceStrategy::Prefix,
            BalanceMode::Seeded => BalanceStrategy::Seeded(self.balance_seed),
        }
    }

    /// Convert into the runner's configuration
    #[must_use]
    pub fn to_runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            min_validation_samples: self.min_validation_samples,
            balance: self.strategy(),
            artifact_extension: self.artifact_extension.clone(),
            scratch_parent: self.scratch_dir.clone(),
        }
    }
}

/// Sweep configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepConfig {
    /// Model author
    pub author: String,
    /// Base model name
    pub model_name: String,
    /// Model version
    #[serde(default = "default_version")]
    pub version: String,
    /// Directory with one subdirectory per class
    pub resources_dir: PathBuf,
    /// Root for run directories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Training engine parameters
    #[serde(default)]
    pub training: TrainingParameters,
    /// Runner settings
    #[serde(default)]
    pub runner: RunnerSettings,
}

fn default_version() -> String {
    "v1".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl SweepConfig {
    /// Load sweep configuration from YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load sweep configuration from YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed or fails validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for empty identity fields and `InvalidValue`
    /// for out-of-range settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("author", &self.author),
            ("model_name", &self.model_name),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field.to_string()));
            }
        }

        if !is_valid_version(&self.version) {
            return Err(ConfigError::InvalidValue {
                field: "version".to_string(),
                reason: format!("'{}' cannot be encoded in artifact names", self.version),
            });
        }

        let fraction = self.training.validation_fraction;
        if !(0.0..1.0).contains(&fraction) {
            return Err(ConfigError::InvalidValue {
                field: "training.validation_fraction".to_string(),
                reason: format!("{fraction} is outside [0, 1)"),
            });
        }
        if self.runner.artifact_extension.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "runner.artifact_extension".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Build the sweep request described by this configuration
    #[must_use]
    pub fn to_request(&self) -> SweepRequest {
        SweepRequest {
            author: self.author.clone(),
            model_name: self.model_name.clone(),
            version: self.version.clone(),
            resources_dir: self.resources_dir.clone(),
            output_dir: self.output_dir.clone(),
            parameters: self.training.clone(),
        }
    }
}
