//! Wearable anomaly engine: reconstruction-error anomaly detection for wearable sensor
//! time series.
//!
//! Modular structure:
//! - [`features`]: Channel schema, min-max normalization, sequence windowing
//! - [`model`]: Encoder–decoder LSTM autoencoder and the persisted model bundle
//! - [`calibration`]: Threshold calibration from validation errors
//! - [`scoring`]: Anomaly score, verdict and alert level
//! - [`attribution`]: Per-channel error breakdown
//! - [`engine`]: Detection engine over an immutable trained model
//! - [`logging`]: Structured JSON logging

pub mod attribution;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod scoring;

pub use attribution::{attribute, FeatureAttribution};
pub use calibration::{compute_threshold, Threshold, ThresholdCalibrator};
pub use config::EngineConfig;
pub use engine::{fit_normalizer, normalize, Analysis, AnomalyEngine};
pub use error::{EngineError, Result};
pub use features::{Channel, FeatureSchema, FeatureVector, NormalizationState, SequenceWindow};
pub use logging::StructuredLogger;
pub use model::{ModelBundle, SequenceAutoencoder};
pub use scoring::{AlertLevel, AnomalyResult, Scorer};
