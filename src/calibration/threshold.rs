//! Offline threshold calibration from validation reconstruction errors.

use crate::config::{ThresholdConfig, ThresholdMode};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// How a threshold was derived, kept so recalibration can be reproduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub mode: ThresholdMode,
    pub multiplier: f64,
    pub percentile: f64,
    pub min_threshold: f64,
    pub samples: usize,
    pub mean: f64,
    pub std: f64,
    /// Value before the `min_threshold` floor.
    pub raw: f64,
    pub floor_applied: bool,
}

/// Decision cutoff on reconstruction error. Always positive and finite: every constructor,
/// deserialization included, goes through validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThreshold")]
pub struct Threshold {
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<CalibrationRecord>,
}

#[derive(Deserialize)]
struct RawThreshold {
    value: f64,
    #[serde(default)]
    calibration: Option<CalibrationRecord>,
}

impl TryFrom<RawThreshold> for Threshold {
    type Error = EngineError;

    fn try_from(raw: RawThreshold) -> Result<Self> {
        let t = Self {
            value: raw.value,
            calibration: raw.calibration,
        };
        t.validate()?;
        Ok(t)
    }
}

impl Threshold {
    /// A threshold supplied directly rather than calibrated.
    pub fn fixed(value: f64) -> Result<Self> {
        let t = Self {
            value,
            calibration: None,
        };
        t.validate()?;
        Ok(t)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Present when the threshold came from [`ThresholdCalibrator`].
    pub fn calibration(&self) -> Option<&CalibrationRecord> {
        self.calibration.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.value.is_finite() || self.value <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "threshold must be positive and finite, got {}",
                self.value
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdCalibrator {
    config: ThresholdConfig,
}

impl ThresholdCalibrator {
    pub fn new(config: ThresholdConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn calibrate(&self, errors: &[f64]) -> Result<Threshold> {
        if errors.is_empty() {
            return Err(EngineError::InsufficientData(
                "no validation errors to calibrate from".into(),
            ));
        }
        if let Some(bad) = errors.iter().find(|e| !e.is_finite() || **e < 0.0) {
            return Err(EngineError::NumericInstability(format!(
                "invalid reconstruction error {} in validation set",
                bad
            )));
        }

        let c = &self.config;
        let mean = mean(errors);
        let std = population_std(errors, mean);
        let raw = match c.threshold_mode {
            ThresholdMode::MeanStd => mean + c.threshold_multiplier * std,
            ThresholdMode::Percentile => percentile(errors, c.percentile),
        };
        if !raw.is_finite() {
            return Err(EngineError::NumericInstability(format!(
                "calibrated threshold is not finite (mean={}, std={})",
                mean, std
            )));
        }
        let floor_applied = raw < c.min_threshold;
        let value = raw.max(c.min_threshold);

        if floor_applied {
            tracing::warn!(
                raw,
                min_threshold = c.min_threshold,
                "calibrated threshold below floor; using min_threshold"
            );
        }
        tracing::info!(
            mode = ?c.threshold_mode,
            samples = errors.len(),
            mean,
            std,
            threshold = value,
            "threshold calibrated"
        );

        Ok(Threshold {
            value,
            calibration: Some(CalibrationRecord {
                mode: c.threshold_mode,
                multiplier: c.threshold_multiplier,
                percentile: c.percentile,
                min_threshold: c.min_threshold,
                samples: errors.len(),
                mean,
                std,
                raw,
                floor_applied,
            }),
        })
    }
}

/// Calibrate a threshold from `errors` under `config` in one call.
pub fn compute_threshold(errors: &[f64], config: &ThresholdConfig) -> Result<Threshold> {
    ThresholdCalibrator::new(config.clone())?.calibrate(errors)
}

/// Each term is divided before summing so errors near `f64::MAX` do not overflow.
fn mean(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    xs.iter().map(|x| x / n).sum()
}

/// Divides by n, not n - 1. Deviations are scaled by the largest one before squaring.
fn population_std(xs: &[f64], mean: f64) -> f64 {
    let scale = xs.iter().map(|x| (x - mean).abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return 0.0;
    }
    let n = xs.len() as f64;
    let var = xs.iter().map(|x| ((x - mean) / scale).powi(2) / n).sum::<f64>();
    scale * var.sqrt()
}

/// Linear interpolation between closest ranks; `p` in [0, 100].
pub(crate) fn percentile(xs: &[f64], p: f64) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&xs, 0.0), 1.0);
        assert_eq!(percentile(&xs, 100.0), 4.0);
        assert!((percentile(&xs, 50.0) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 95.0), 7.0);
    }

    #[test]
    fn population_std_of_constant_is_zero() {
        assert_eq!(population_std(&[0.2, 0.2, 0.2], 0.2), 0.0);
    }

    #[test]
    fn statistics_do_not_overflow_near_max() {
        let xs = [0.0, f64::MAX];
        let m = mean(&xs);
        assert_eq!(m, f64::MAX / 2.0);
        assert_eq!(population_std(&xs, m), f64::MAX / 2.0);
        assert_eq!(mean(&[1e308, 1e308]), 1e308);
    }
}
