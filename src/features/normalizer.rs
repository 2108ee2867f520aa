//! Per-channel min-max scaling learned once from a fitting corpus.

use crate::error::{EngineError, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Frozen per-channel (min, max). Persisted with the trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationState {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl NormalizationState {
    /// Learn min and max per column. Rows must be non-empty and finite.
    pub fn fit(rows: ArrayView2<'_, f64>) -> Result<Self> {
        let (n_rows, n_cols) = rows.dim();
        if n_rows == 0 || n_cols == 0 {
            return Err(EngineError::shape(
                "normalizer fit input",
                "at least one row and one channel",
                format!("{}x{}", n_rows, n_cols),
            ));
        }
        if let Some(bad) = rows.iter().find(|v| !v.is_finite()) {
            return Err(EngineError::NumericInstability(format!(
                "non-finite value {} in fitting corpus",
                bad
            )));
        }

        let min = rows
            .axis_iter(Axis(1))
            .map(|col| col.fold(f64::INFINITY, |a, &b| a.min(b)))
            .collect();
        let max = rows
            .axis_iter(Axis(1))
            .map(|col| col.fold(f64::NEG_INFINITY, |a, &b| a.max(b)))
            .collect();
        Ok(Self { min, max })
    }

    pub fn channels(&self) -> usize {
        self.min.len()
    }

    /// `(x - min) / (max - min)` per column. Constant channels map to 0.0; out-of-range
    /// values are not clamped.
    pub fn transform(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.validate()?;
        if rows.ncols() != self.channels() {
            return Err(EngineError::shape(
                "normalizer input channels",
                self.channels(),
                rows.ncols(),
            ));
        }
        let mut out = rows.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (lo, hi) = (self.min[j], self.max[j]);
            let range = hi - lo;
            if range > 0.0 {
                col.mapv_inplace(|x| (x - lo) / range);
            } else {
                col.fill(0.0);
            }
        }
        Ok(out)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min.len() != self.max.len() {
            return Err(EngineError::shape(
                "normalization state",
                format!("{} max entries", self.min.len()),
                self.max.len(),
            ));
        }
        for (j, (lo, hi)) in self.min.iter().zip(&self.max).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(EngineError::Configuration(format!(
                    "normalization state for channel {} is invalid: min={} max={}",
                    j, lo, hi
                )));
            }
        }
        Ok(())
    }
}

/// Holds a [`NormalizationState`] once fitted. Refitting replaces it and should only happen
/// during training or calibration.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    state: Option<NormalizationState>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, rows: ArrayView2<'_, f64>) -> Result<&NormalizationState> {
        let state = NormalizationState::fit(rows)?;
        tracing::debug!(channels = state.channels(), rows = rows.nrows(), "normalizer fitted");
        Ok(self.state.insert(state))
    }

    pub fn transform(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.state
            .as_ref()
            .ok_or(EngineError::NotCalibrated("normalizer"))?
            .transform(rows)
    }

    pub fn state(&self) -> Option<&NormalizationState> {
        self.state.as_ref()
    }
}
