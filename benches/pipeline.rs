//! Pipeline benchmark: raw history → normalized windows → calibrated threshold.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wearable_anomaly::calibration::compute_threshold;
use wearable_anomaly::config::{ModelConfig, ThresholdConfig, ThresholdMode};
use wearable_anomaly::engine::{fit_normalizer, normalize, AnomalyEngine};
use wearable_anomaly::features::{create_training_windows, split_windows};
use wearable_anomaly::model::SequenceAutoencoder;

fn make_history(rows: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, 5), |(t, c)| {
        let phase = t as f64 / 60.0;
        match c {
            0 => 70.0 + 10.0 * phase.sin(),
            1 => (phase * 3.0).cos().max(0.0) * 120.0,
            2 => if (t / 480) % 3 == 0 { 1.0 } else { 0.0 },
            3 => 36.6 + 0.2 * (phase * 0.5).sin(),
            _ => (phase * 2.0).sin().abs(),
        }
    })
}

fn bench_normalize_and_window(c: &mut Criterion) {
    let history = make_history(1440);
    let state = fit_normalizer(history.view()).unwrap();

    c.bench_function("normalize_1440_rows", |b| {
        b.iter(|| normalize(black_box(history.view()), &state))
    });

    let normalized = normalize(history.view(), &state).unwrap();
    c.bench_function("windows_1440_rows_len60", |b| {
        b.iter(|| create_training_windows(black_box(normalized.view()), 60))
    });
}

fn bench_threshold(c: &mut Criterion) {
    let errors: Vec<f64> = (0..1000).map(|i| 0.01 + (i as f64 * 0.37).sin().abs() * 0.05).collect();
    let mean_std = ThresholdConfig::default();
    let percentile = ThresholdConfig {
        threshold_mode: ThresholdMode::Percentile,
        ..ThresholdConfig::default()
    };

    c.bench_function("threshold_mean_std_1000", |b| {
        b.iter(|| compute_threshold(black_box(&errors), &mean_std))
    });
    c.bench_function("threshold_percentile_1000", |b| {
        b.iter(|| compute_threshold(black_box(&errors), &percentile))
    });
}

fn bench_full_calibration(c: &mut Criterion) {
    let config = ModelConfig {
        hidden_size: 16,
        ..ModelConfig::default()
    };
    let history = make_history(400);
    let state = fit_normalizer(history.view()).unwrap();
    let model =
        SequenceAutoencoder::new(config.hyperparameters().unwrap(), &mut StdRng::seed_from_u64(1)).unwrap();
    let engine = AnomalyEngine::new(
        config.schema().unwrap(),
        model,
        state,
        None,
        ThresholdConfig::default(),
    )
    .unwrap();
    let normalized = engine.normalize(history.view()).unwrap();

    c.bench_function("history_400_to_threshold", |b| {
        b.iter(|| {
            let windows = create_training_windows(black_box(normalized.view()), 60).unwrap();
            let split = split_windows(windows, 0.2, 0.1, &mut StdRng::seed_from_u64(42)).unwrap();
            black_box(engine.calibrate(&split.validation))
        })
    });
}

criterion_group!(benches, bench_normalize_and_window, bench_threshold, bench_full_calibration);
criterion_main!(benches);
