//! Turns a reconstruction error and a threshold into a bounded score, a verdict and an
//! alert level.

use crate::calibration::Threshold;
use crate::config::AlertConfig;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Threshold-relative score above which growth becomes logarithmic.
pub const SCORE_COMPRESSION_KNEE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    pub fn from_score(score: f64, config: &AlertConfig) -> Self {
        if score >= config.critical {
            AlertLevel::Critical
        } else if score >= config.high {
            AlertLevel::High
        } else if score >= config.medium {
            AlertLevel::Medium
        } else {
            AlertLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }
}

/// Detection outcome for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub reconstruction_error: f64,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub threshold_used: f64,
}

impl AnomalyResult {
    pub fn alert_level(&self, config: &AlertConfig) -> AlertLevel {
        AlertLevel::from_score(self.anomaly_score, config)
    }
}

/// `error / threshold`, log-compressed past [`SCORE_COMPRESSION_KNEE`].
pub fn compress(raw: f64) -> f64 {
    if raw > SCORE_COMPRESSION_KNEE {
        SCORE_COMPRESSION_KNEE + (raw - SCORE_COMPRESSION_KNEE).max(0.0).ln_1p()
    } else {
        raw
    }
}

/// `score(error, threshold) -> (anomaly_score, is_anomaly)`.
///
/// Negative errors clamp to zero and infinite ones to `f64::MAX`; NaN has no sensible
/// fallback and is reported. The threshold must be positive and finite.
pub fn score(error: f64, threshold: Option<&Threshold>) -> Result<(f64, bool)> {
    let threshold = threshold.ok_or(EngineError::NotCalibrated("threshold"))?;
    threshold.validate()?;
    let t = threshold.value();
    if error.is_nan() {
        return Err(EngineError::NumericInstability(
            "reconstruction error is NaN".into(),
        ));
    }
    let error = error.clamp(0.0, f64::MAX);
    let anomaly_score = compress((error / t).min(f64::MAX));
    Ok((anomaly_score, error > t))
}

/// Scores errors against a fixed threshold.
pub struct Scorer {
    threshold: Option<Threshold>,
}

impl Scorer {
    pub fn new(threshold: Option<Threshold>) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Option<&Threshold> {
        self.threshold.as_ref()
    }

    pub fn evaluate(&self, reconstruction_error: f64) -> Result<AnomalyResult> {
        let (anomaly_score, is_anomaly) = score(reconstruction_error, self.threshold.as_ref())?;
        let threshold_used = self.threshold.as_ref().map(Threshold::value).unwrap_or_default();
        Ok(AnomalyResult {
            reconstruction_error: reconstruction_error.clamp(0.0, f64::MAX),
            anomaly_score,
            is_anomaly,
            threshold_used,
        })
    }
}
