//! Structured logging setup and per-detection records.

mod format;

pub use format::{DetectionLog, StructuredLogger};
