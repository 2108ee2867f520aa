//! Trained-model bundle: weights, hyperparameters, schema, threshold and normalization state,
//! stored together as one JSON document.

use super::autoencoder::{AutoencoderWeights, Hyperparameters, SequenceAutoencoder};
use crate::calibration::Threshold;
use crate::error::{EngineError, Result};
use crate::features::{FeatureSchema, NormalizationState};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub hyperparameters: Hyperparameters,
    pub feature_names: FeatureSchema,
    pub weights: AutoencoderWeights,
    #[serde(default)]
    pub threshold: Option<Threshold>,
    pub normalization_state: NormalizationState,
}

impl ModelBundle {
    pub fn new(
        model: &SequenceAutoencoder,
        schema: FeatureSchema,
        normalization_state: NormalizationState,
        threshold: Option<Threshold>,
    ) -> Self {
        Self {
            hyperparameters: model.hyperparameters().clone(),
            feature_names: schema,
            weights: model.weights().clone(),
            threshold,
            normalization_state,
        }
    }

    /// Cross-checks schema, normalization state and weights against the hyperparameters.
    pub fn validate(&self) -> Result<()> {
        let f = self.hyperparameters.input_size;
        if self.feature_names.len() != f {
            return Err(EngineError::Configuration(format!(
                "bundle declares {} channels but input_size is {}",
                self.feature_names.len(),
                f
            )));
        }
        self.normalization_state.validate()?;
        if self.normalization_state.channels() != f {
            return Err(EngineError::Configuration(format!(
                "normalization state covers {} channels but input_size is {}",
                self.normalization_state.channels(),
                f
            )));
        }
        if let Some(t) = &self.threshold {
            t.validate()?;
        }
        Ok(())
    }

    /// Model rebuilt from the bundle's weights.
    pub fn model(&self) -> Result<SequenceAutoencoder> {
        SequenceAutoencoder::from_parts(self.hyperparameters.clone(), self.weights.clone())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec(self)?;
        std::fs::write(path, data)?;
        tracing::info!(path = %path.display(), "model bundle saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let bundle: ModelBundle = serde_json::from_slice(&data)?;
        bundle.validate()?;
        tracing::info!(
            path = %path.display(),
            channels = bundle.feature_names.len(),
            sequence_length = bundle.hyperparameters.sequence_length,
            calibrated = bundle.threshold.is_some(),
            "model bundle loaded"
        );
        Ok(bundle)
    }
}
