//! Engine configuration. Built once, validated, then passed by reference into constructors.

use crate::error::{EngineError, Result};
use crate::features::FeatureSchema;
use crate::model::Hyperparameters;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model architecture and channel schema
    pub model: ModelConfig,
    /// Threshold calibration
    pub threshold: ThresholdConfig,
    /// Alert level cut-offs on anomaly score
    pub alerts: AlertConfig,
    /// Train / validation / test split used when recalibrating
    pub split: SplitConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Ordered channel names; order must match the trained model
    pub feature_names: Vec<String>,
    /// Rows per window (minutes of history)
    pub sequence_length: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    /// Set to use the variational variant
    pub latent_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// mean + k·std
    MeanStd,
    Percentile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub threshold_mode: ThresholdMode,
    /// k in mean + k·std
    pub threshold_multiplier: f64,
    /// p in percentile mode, 0–100
    pub percentile: f64,
    /// Floor for the calibrated threshold
    pub min_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Score at or above this is medium
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_size: f64,
    pub validation_size: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            feature_names: FeatureSchema::default()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            sequence_length: 60,
            hidden_size: 64,
            num_layers: 2,
            dropout: 0.2,
            latent_size: None,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold_mode: ThresholdMode::MeanStd,
            threshold_multiplier: 1.0,
            percentile: 95.0,
            min_threshold: 0.01,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            medium: 2.0,
            high: 5.0,
            critical: 10.0,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            validation_size: 0.1,
            seed: 42,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl ModelConfig {
    pub fn schema(&self) -> Result<FeatureSchema> {
        FeatureSchema::from_names(&self.feature_names)
    }

    pub fn hyperparameters(&self) -> Result<Hyperparameters> {
        let hparams = Hyperparameters {
            input_size: self.schema()?.len(),
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            dropout: self.dropout,
            sequence_length: self.sequence_length,
            latent_size: self.latent_size,
        };
        hparams.validate()?;
        Ok(hparams)
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier < 0.0 {
            return Err(EngineError::Configuration(format!(
                "threshold_multiplier must be finite and >= 0, got {}",
                self.threshold_multiplier
            )));
        }
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(EngineError::Configuration(format!(
                "percentile must be in [0, 100], got {}",
                self.percentile
            )));
        }
        if !self.min_threshold.is_finite() || self.min_threshold <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "min_threshold must be finite and > 0, got {}",
                self.min_threshold
            )));
        }
        Ok(())
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.medium <= self.high && self.high <= self.critical) {
            return Err(EngineError::Configuration(format!(
                "alert levels must be ordered medium <= high <= critical, got {} / {} / {}",
                self.medium, self.high, self.critical
            )));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load from a JSON file. A missing file yields defaults; an unreadable or invalid one is
    /// an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = serde_json::from_str(&data).map_err(|e| {
            EngineError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.hyperparameters()?;
        self.threshold.validate()?;
        self.alerts.validate()?;
        if self.split.test_size + self.split.validation_size >= 1.0 {
            return Err(EngineError::Configuration(
                "test_size + validation_size must be < 1".into(),
            ));
        }
        Ok(())
    }
}
