//! JSON log lines: one JSON object per line (ndjson) for ingestion and audit.

use crate::attribution::ChannelError;
use crate::engine::Analysis;
use crate::scoring::AlertLevel;
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// One detection, flattened for log pipelines.
#[derive(Serialize)]
pub struct DetectionLog<'a> {
    pub ts: String,
    pub reconstruction_error: f64,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub threshold: f64,
    pub alert_level: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_channel: Option<&'a str>,
    pub top_features: &'a [ChannelError],
}

impl<'a> DetectionLog<'a> {
    pub fn new(analysis: &'a Analysis, level: AlertLevel) -> Self {
        let r = &analysis.result;
        Self {
            ts: Utc::now().to_rfc3339(),
            reconstruction_error: r.reconstruction_error,
            anomaly_score: r.anomaly_score,
            is_anomaly: r.is_anomaly,
            threshold: r.threshold_used,
            alert_level: level.as_str(),
            top_channel: analysis.attribution.most_anomalous().map(|c| c.as_str()),
            top_features: &analysis.attribution.top_anomalous_features,
        }
    }
}

/// Initialize tracing with JSON format (one JSON object per line)
pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber: JSON lines to stderr, level from RUST_LOG or default.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    /// Emit a single structured record without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)?;
        w.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::FeatureAttribution;
    use crate::features::Channel;
    use crate::scoring::AnomalyResult;

    fn analysis(is_anomaly: bool) -> Analysis {
        let top = ChannelError {
            channel: Channel::HeartRate,
            error: 0.4,
        };
        Analysis {
            result: AnomalyResult {
                reconstruction_error: 0.4,
                anomaly_score: 8.0,
                is_anomaly,
                threshold_used: 0.05,
            },
            attribution: FeatureAttribution {
                feature_scores: vec![top],
                top_anomalous_features: vec![top],
            },
        }
    }

    #[test]
    fn detection_log_is_one_json_line() {
        let a = analysis(true);
        let mut out = Vec::new();
        StructuredLogger::emit_json(&DetectionLog::new(&a, AlertLevel::High), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);

        let v: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(v["alert_level"], "high");
        assert_eq!(v["top_channel"], "heart_rate");
        assert_eq!(v["is_anomaly"], true);
        assert!(v["ts"].as_str().is_some());
        assert_eq!(v["top_features"][0]["channel"], "heart_rate");
    }

    #[test]
    fn top_channel_omitted_without_attribution() {
        let mut a = analysis(false);
        a.attribution.top_anomalous_features.clear();
        let log = DetectionLog::new(&a, AlertLevel::Low);
        let json = serde_json::to_string(&log).unwrap();
        assert!(!json.contains("top_channel"));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let a = analysis(true);
        let err = StructuredLogger::emit_json(&DetectionLog::new(&a, AlertLevel::High), &mut ClosedPipe)
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
