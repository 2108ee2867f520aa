//! Decision threshold derived from held-out reconstruction errors.

mod threshold;

pub use threshold::{compute_threshold, CalibrationRecord, Threshold, ThresholdCalibrator};
