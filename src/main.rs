//! Command-line entrypoint: score the latest window of a record history, or recalibrate a
//! bundle's threshold from a record history.
//!
//! Usage:
//!   wearable-anomaly detect <bundle.json> <records.json>
//!   wearable-anomaly calibrate <bundle.json> <records.json> <out.json>
//!
//! Record files are JSON arrays of `{"channel": value, ...}` objects, oldest first.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;
use wearable_anomaly::{
    config::EngineConfig,
    engine::AnomalyEngine,
    features::{create_training_windows, pad_repeat_last, split_windows, SequenceWindow},
    logging::{DetectionLog, StructuredLogger},
    model::ModelBundle,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn read_records(engine: &AnomalyEngine, path: &Path) -> Result<ndarray::Array2<f64>, BoxError> {
    let data = std::fs::read_to_string(path)?;
    let records: Vec<HashMap<String, f64>> = serde_json::from_str(&data)?;
    let vectors = records
        .iter()
        .map(|r| engine.schema().vector_from_map(r))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(engine.schema().stack(&vectors)?)
}

fn run_detect(config: &EngineConfig, engine: &AnomalyEngine, records: &Path) -> Result<(), BoxError> {
    let raw = read_records(engine, records)?;
    let normalized = engine.normalize(raw.view())?;
    if normalized.nrows() < engine.sequence_length() {
        info!(
            rows = normalized.nrows(),
            sequence_length = engine.sequence_length(),
            "short history; repeating last record"
        );
    }
    let padded = pad_repeat_last(normalized.view(), engine.sequence_length())?;
    let window = SequenceWindow::new(padded, engine.sequence_length())?;

    let analysis = engine.analyze(&window)?;
    let level = analysis.result.alert_level(&config.alerts);
    StructuredLogger::emit_json(&DetectionLog::new(&analysis, level), &mut std::io::stdout())?;
    Ok(())
}

fn run_calibrate(
    config: &EngineConfig,
    engine: AnomalyEngine,
    records: &Path,
    out: &Path,
) -> Result<(), BoxError> {
    let raw = read_records(&engine, records)?;
    let normalized = engine.normalize(raw.view())?;
    let windows = create_training_windows(normalized.view(), engine.sequence_length())?;
    let mut rng = StdRng::seed_from_u64(config.split.seed);
    let split = split_windows(
        windows,
        config.split.test_size,
        config.split.validation_size,
        &mut rng,
    )?;
    info!(
        train = split.train.len(),
        validation = split.validation.len(),
        test = split.test.len(),
        "windows split"
    );

    let threshold = engine.calibrate(&split.validation)?;
    let engine = engine.with_threshold(threshold);
    if !split.test.is_empty() {
        let flagged = split
            .test
            .iter()
            .map(|w| engine.detect(w).map(|r| r.is_anomaly))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|a| *a)
            .count();
        info!(flagged, total = split.test.len(), "held-out windows flagged");
    }
    engine.to_bundle().save(out)?;
    Ok(())
}

fn main() -> Result<(), BoxError> {
    let config_path = std::env::var("WEARABLE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = EngineConfig::load(&config_path)?;

    StructuredLogger::init(config.log.json, &config.log.level);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let usage = "usage: wearable-anomaly detect <bundle> <records> | calibrate <bundle> <records> <out>";
    let (command, bundle_path) = match (args.first(), args.get(1)) {
        (Some(c), Some(b)) => (c.as_str(), PathBuf::from(b)),
        _ => return Err(usage.into()),
    };

    let bundle = ModelBundle::load(&bundle_path)?;
    let engine = AnomalyEngine::from_bundle(bundle, &config)?;
    info!(
        channels = ?engine.schema().names(),
        sequence_length = engine.sequence_length(),
        variational = engine.model().is_variational(),
        "engine ready"
    );

    match (command, args.get(2), args.get(3)) {
        ("detect", Some(records), _) => run_detect(&config, &engine, Path::new(records)),
        ("calibrate", Some(records), Some(out)) => {
            run_calibrate(&config, engine, Path::new(records), Path::new(out))
        }
        _ => Err(usage.into()),
    }
}
