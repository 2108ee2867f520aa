//! Inference benchmark: one 60×5 window → reconstruction and score (wearable gateway target).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wearable_anomaly::calibration::Threshold;
use wearable_anomaly::config::{ModelConfig, ThresholdConfig};
use wearable_anomaly::engine::{fit_normalizer, AnomalyEngine};
use wearable_anomaly::features::SequenceWindow;
use wearable_anomaly::model::SequenceAutoencoder;

fn make_engine(hidden_size: usize, latent_size: Option<usize>) -> (AnomalyEngine, SequenceWindow) {
    let config = ModelConfig {
        hidden_size,
        latent_size,
        ..ModelConfig::default()
    };
    let hparams = config.hyperparameters().unwrap();
    let len = hparams.sequence_length;
    let model = SequenceAutoencoder::new(hparams, &mut StdRng::seed_from_u64(0)).unwrap();
    let rows = Array2::from_shape_fn((len, 5), |(t, c)| ((t + c) as f64 * 0.3).sin());
    let state = fit_normalizer(rows.view()).unwrap();
    let engine = AnomalyEngine::new(
        config.schema().unwrap(),
        model,
        state,
        Some(Threshold::fixed(0.05).unwrap()),
        ThresholdConfig::default(),
    )
    .unwrap();
    let window = SequenceWindow::new(engine.normalize(rows.view()).unwrap(), len).unwrap();
    (engine, window)
}

fn bench_detect_default(c: &mut Criterion) {
    let (engine, window) = make_engine(64, None);

    c.bench_function("detect_60x5_h64", |b| {
        b.iter(|| engine.detect(black_box(&window)))
    });
    c.bench_function("analyze_60x5_h64", |b| {
        b.iter(|| engine.analyze(black_box(&window)))
    });
}

fn bench_detect_hidden_size(c: &mut Criterion) {
    let mut g = c.benchmark_group("detect_by_hidden");
    for h in [16, 32, 64, 128] {
        let (engine, window) = make_engine(h, None);
        g.bench_function(format!("hidden_{}", h).as_str(), |b| {
            b.iter(|| engine.detect(black_box(&window)))
        });
    }
    g.finish();
}

fn bench_variational(c: &mut Criterion) {
    let (engine, window) = make_engine(64, Some(16));

    c.bench_function("detect_60x5_h64_z16", |b| {
        b.iter(|| engine.detect(black_box(&window)))
    });
}

criterion_group!(benches, bench_detect_default, bench_detect_hidden_size, bench_variational);
criterion_main!(benches);
