//! Anomaly scoring and alert levels.

mod engine;

pub use engine::{compress, score, AlertLevel, AnomalyResult, Scorer, SCORE_COMPRESSION_KNEE};
