//! Detection engine: an immutable trained model plus its normalization state and threshold.
//!
//! Everything here is a synchronous computation over read-only state, so one engine can be
//! shared behind an `Arc` by any number of concurrent callers.

use crate::attribution::{self, FeatureAttribution};
use crate::calibration::{Threshold, ThresholdCalibrator};
use crate::config::{EngineConfig, ThresholdConfig};
use crate::error::{EngineError, Result};
use crate::features::{
    latest_window, FeatureSchema, FeatureVector, NormalizationState, SequenceWindow,
};
use crate::model::{reconstruction_error, ModelBundle, Reconstruction, SequenceAutoencoder};
use crate::scoring::{AnomalyResult, Scorer};
use ndarray::{Array2, ArrayView2};
use serde::Serialize;

/// `fit_normalizer(rows) -> NormalizationState`
pub fn fit_normalizer(rows: ArrayView2<'_, f64>) -> Result<NormalizationState> {
    NormalizationState::fit(rows)
}

/// `normalize(rows, state) -> rows'`
pub fn normalize(rows: ArrayView2<'_, f64>, state: &NormalizationState) -> Result<Array2<f64>> {
    state.transform(rows)
}

/// Detection result together with the per-channel explanation from the same reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub result: AnomalyResult,
    pub attribution: FeatureAttribution,
}

pub struct AnomalyEngine {
    schema: FeatureSchema,
    model: SequenceAutoencoder,
    normalization: NormalizationState,
    scorer: Scorer,
    threshold_config: ThresholdConfig,
}

impl AnomalyEngine {
    pub fn new(
        schema: FeatureSchema,
        model: SequenceAutoencoder,
        normalization: NormalizationState,
        threshold: Option<Threshold>,
        threshold_config: ThresholdConfig,
    ) -> Result<Self> {
        let f = model.hyperparameters().input_size;
        if schema.len() != f {
            return Err(EngineError::Configuration(format!(
                "schema has {} channels but model expects {}",
                schema.len(),
                f
            )));
        }
        normalization.validate()?;
        if normalization.channels() != f {
            return Err(EngineError::Configuration(format!(
                "normalization state has {} channels but model expects {}",
                normalization.channels(),
                f
            )));
        }
        threshold_config.validate()?;
        Ok(Self {
            schema,
            model,
            normalization,
            scorer: Scorer::new(threshold),
            threshold_config,
        })
    }

    /// Build from a loaded bundle, rejecting bundles whose schema or window length disagree
    /// with the configuration.
    pub fn from_bundle(bundle: ModelBundle, config: &EngineConfig) -> Result<Self> {
        bundle.validate()?;
        let expected = config.model.schema()?;
        if bundle.feature_names != expected {
            return Err(EngineError::Configuration(format!(
                "bundle channels {:?} do not match configured {:?}",
                bundle.feature_names.names(),
                expected.names()
            )));
        }
        if bundle.hyperparameters.sequence_length != config.model.sequence_length {
            return Err(EngineError::Configuration(format!(
                "bundle sequence_length {} does not match configured {}",
                bundle.hyperparameters.sequence_length, config.model.sequence_length
            )));
        }
        let model = bundle.model()?;
        Self::new(
            bundle.feature_names,
            model,
            bundle.normalization_state,
            bundle.threshold,
            config.threshold.clone(),
        )
    }

    pub fn to_bundle(&self) -> ModelBundle {
        ModelBundle::new(
            &self.model,
            self.schema.clone(),
            self.normalization.clone(),
            self.scorer.threshold().cloned(),
        )
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model(&self) -> &SequenceAutoencoder {
        &self.model
    }

    pub fn normalization(&self) -> &NormalizationState {
        &self.normalization
    }

    pub fn threshold(&self) -> Option<&Threshold> {
        self.scorer.threshold()
    }

    pub fn sequence_length(&self) -> usize {
        self.model.hyperparameters().sequence_length
    }

    pub fn normalize(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.normalization.transform(rows)
    }

    /// Stack raw records, normalize them and take the most recent window. The caller is
    /// responsible for padding histories shorter than the sequence length.
    pub fn window_from_records(&self, records: &[FeatureVector]) -> Result<SequenceWindow> {
        let raw = self.schema.stack(records)?;
        let normalized = self.normalize(raw.view())?;
        latest_window(normalized.view(), self.sequence_length())
    }

    pub fn reconstruct(&self, window: &SequenceWindow) -> Result<Reconstruction> {
        self.model.reconstruct(window)
    }

    pub fn reconstruction_error(&self, window: &SequenceWindow) -> Result<f64> {
        let rec = self.model.reconstruct(window)?;
        reconstruction_error(window.view(), rec.reconstructed.view())
    }

    /// One error per window, for calibration.
    pub fn reconstruction_errors(&self, windows: &[SequenceWindow]) -> Result<Vec<f64>> {
        windows.iter().map(|w| self.reconstruction_error(w)).collect()
    }

    /// Derive a threshold from validation windows. Does not change this engine; publish the
    /// result with [`with_threshold`](Self::with_threshold).
    pub fn calibrate(&self, validation: &[SequenceWindow]) -> Result<Threshold> {
        let calibrator = ThresholdCalibrator::new(self.threshold_config.clone())?;
        let errors = self.reconstruction_errors(validation)?;
        calibrator.calibrate(&errors)
    }

    pub fn with_threshold(self, threshold: Threshold) -> Self {
        Self {
            scorer: Scorer::new(Some(threshold)),
            ..self
        }
    }

    /// Score one window against the engine's threshold.
    pub fn detect(&self, window: &SequenceWindow) -> Result<AnomalyResult> {
        self.detect_with(window, &self.scorer)
    }

    /// `detect(window, threshold)` with an explicit threshold.
    pub fn detect_against(
        &self,
        window: &SequenceWindow,
        threshold: Option<&Threshold>,
    ) -> Result<AnomalyResult> {
        self.detect_with(window, &Scorer::new(threshold.cloned()))
    }

    fn detect_with(&self, window: &SequenceWindow, scorer: &Scorer) -> Result<AnomalyResult> {
        if scorer.threshold().is_none() {
            return Err(EngineError::NotCalibrated("threshold"));
        }
        let error = self.reconstruction_error(window)?;
        let result = scorer.evaluate(error)?;
        tracing::debug!(
            error = result.reconstruction_error,
            score = result.anomaly_score,
            is_anomaly = result.is_anomaly,
            "window scored"
        );
        Ok(result)
    }

    pub fn attribute(
        &self,
        window: &SequenceWindow,
        reconstructed: ArrayView2<'_, f64>,
    ) -> Result<FeatureAttribution> {
        attribution::attribute(window.view(), reconstructed, &self.schema)
    }

    /// Detection and attribution from a single reconstruction.
    pub fn analyze(&self, window: &SequenceWindow) -> Result<Analysis> {
        if self.scorer.threshold().is_none() {
            return Err(EngineError::NotCalibrated("threshold"));
        }
        let rec = self.model.reconstruct(window)?;
        let error = reconstruction_error(window.view(), rec.reconstructed.view())?;
        let result = self.scorer.evaluate(error)?;
        let attribution = self.attribute(window, rec.reconstructed.view())?;
        if result.is_anomaly {
            tracing::info!(
                error = result.reconstruction_error,
                score = result.anomaly_score,
                top_channel = attribution.most_anomalous().map(|c| c.as_str()),
                "anomalous window"
            );
        }
        Ok(Analysis {
            result,
            attribution,
        })
    }
}
