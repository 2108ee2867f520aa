//! Scoring, threshold calibration and alert levels.

use wearable_anomaly::{
    calibration::{compute_threshold, Threshold, ThresholdCalibrator},
    config::{AlertConfig, ThresholdConfig, ThresholdMode},
    error::EngineError,
    scoring::{compress, score, AlertLevel, Scorer, SCORE_COMPRESSION_KNEE},
};

fn t(v: f64) -> Threshold {
    Threshold::fixed(v).unwrap()
}

#[test]
fn score_is_ratio_up_to_knee() {
    let th = t(0.5);
    for e in [0.0, 0.1, 0.5, 1.0, 25.0, 50.0] {
        let (s, _) = score(e, Some(&th)).unwrap();
        assert_eq!(s, e / 0.5);
    }
}

#[test]
fn score_is_log_compressed_past_knee() {
    let th = t(0.1);
    let (s, anomalous) = score(20.0, Some(&th)).unwrap();
    let raw = 20.0 / 0.1;
    assert_eq!(s, SCORE_COMPRESSION_KNEE + (raw - SCORE_COMPRESSION_KNEE).ln_1p());
    assert!(anomalous);
    assert!(s < raw);
}

#[test]
fn score_is_strictly_increasing_across_knee() {
    let th = t(1.0);
    let errors = [99.0, 99.5, 100.0, 100.5, 101.0, 150.0, 1e4, 1e8, 1e300];
    let scores: Vec<f64> = errors
        .iter()
        .map(|e| score(*e, Some(&th)).unwrap().0)
        .collect();
    assert!(scores.windows(2).all(|w| w[0] < w[1]), "{:?}", scores);
}

#[test]
fn zero_error_is_not_anomalous() {
    let (s, anomalous) = score(0.0, Some(&t(0.01))).unwrap();
    assert_eq!(s, 0.0);
    assert!(!anomalous);
}

#[test]
fn error_equal_to_threshold_is_not_anomalous() {
    let (s, anomalous) = score(0.25, Some(&t(0.25))).unwrap();
    assert_eq!(s, 1.0);
    assert!(!anomalous);
    let (_, anomalous) = score(0.250001, Some(&t(0.25))).unwrap();
    assert!(anomalous);
}

#[test]
fn score_without_threshold_is_not_calibrated() {
    assert!(matches!(
        score(0.3, None),
        Err(EngineError::NotCalibrated(_))
    ));
    assert!(matches!(
        Scorer::new(None).evaluate(0.3),
        Err(EngineError::NotCalibrated(_))
    ));
}

#[test]
fn score_clamps_numeric_edges() {
    let th = t(0.5);
    let (s, anomalous) = score(-1.0, Some(&th)).unwrap();
    assert_eq!(s, 0.0);
    assert!(!anomalous);

    let (s, anomalous) = score(f64::INFINITY, Some(&t(1e-3))).unwrap();
    assert!(s.is_finite());
    assert!(anomalous);

    assert!(matches!(
        score(f64::NAN, Some(&th)),
        Err(EngineError::NumericInstability(_))
    ));
}

#[test]
fn compress_never_takes_log_of_negative() {
    assert_eq!(compress(SCORE_COMPRESSION_KNEE), SCORE_COMPRESSION_KNEE);
    assert_eq!(compress(3.0), 3.0);
    assert!(compress(100.0 + 1e-12) >= 100.0);
}

#[test]
fn scorer_builds_result() {
    let r = Scorer::new(Some(t(0.2))).evaluate(0.5).unwrap();
    assert_eq!(r.reconstruction_error, 0.5);
    assert_eq!(r.anomaly_score, 2.5);
    assert!(r.is_anomaly);
    assert_eq!(r.threshold_used, 0.2);
    assert_eq!(r.alert_level(&AlertConfig::default()), AlertLevel::Medium);
}

#[test]
fn alert_levels_use_inclusive_cutoffs() {
    let c = AlertConfig::default();
    assert_eq!(AlertLevel::from_score(0.0, &c), AlertLevel::Low);
    assert_eq!(AlertLevel::from_score(1.99, &c), AlertLevel::Low);
    assert_eq!(AlertLevel::from_score(2.0, &c), AlertLevel::Medium);
    assert_eq!(AlertLevel::from_score(5.0, &c), AlertLevel::High);
    assert_eq!(AlertLevel::from_score(10.0, &c), AlertLevel::Critical);
    assert_eq!(AlertLevel::from_score(250.0, &c), AlertLevel::Critical);
}

#[test]
fn fixed_threshold_must_be_positive() {
    assert!(Threshold::fixed(0.0).is_err());
    assert!(Threshold::fixed(-0.1).is_err());
    assert!(Threshold::fixed(f64::NAN).is_err());
    assert!(Threshold::fixed(0.02).is_ok());
}

#[test]
fn mean_std_scenario() {
    let errors = [0.1, 0.2, 0.3, 0.4, 10.0];
    let th = compute_threshold(&errors, &ThresholdConfig::default()).unwrap();
    let rec = th.calibration().cloned().unwrap();
    assert!((rec.mean - 2.2).abs() < 1e-12);
    // Population standard deviation: sqrt(76.1 / 5).
    assert!((rec.std - (76.1f64 / 5.0).sqrt()).abs() < 1e-12);
    assert!((th.value() - (2.2 + (15.22f64).sqrt())).abs() < 1e-9);
    assert!((th.value() - 6.08).abs() < 0.05);
    assert!(!rec.floor_applied);
    assert_eq!(rec.mode, ThresholdMode::MeanStd);
    assert_eq!(rec.samples, 5);
}

#[test]
fn multiplier_scales_std() {
    let errors = [1.0, 3.0];
    let config = ThresholdConfig {
        threshold_multiplier: 2.5,
        ..ThresholdConfig::default()
    };
    let th = compute_threshold(&errors, &config).unwrap();
    assert!((th.value() - (2.0 + 2.5 * 1.0)).abs() < 1e-12);
}

#[test]
fn percentile_100_is_max() {
    let errors = [0.3, 0.05, 0.9, 0.41, 0.2];
    let config = ThresholdConfig {
        threshold_mode: ThresholdMode::Percentile,
        percentile: 100.0,
        ..ThresholdConfig::default()
    };
    let th = compute_threshold(&errors, &config).unwrap();
    assert!((th.value() - 0.9).abs() < 1e-12);
}

#[test]
fn percentile_default_interpolates() {
    let errors: Vec<f64> = (1..=21).map(|i| i as f64).collect();
    let config = ThresholdConfig {
        threshold_mode: ThresholdMode::Percentile,
        ..ThresholdConfig::default()
    };
    // rank = 0.95 * 20 = 19 -> 20.0
    let th = compute_threshold(&errors, &config).unwrap();
    assert!((th.value() - 20.0).abs() < 1e-9);
}

#[test]
fn floor_applies_to_tiny_thresholds() {
    let errors = [0.001, 0.001, 0.001];
    let th = compute_threshold(&errors, &ThresholdConfig::default()).unwrap();
    assert_eq!(th.value(), 0.01);
    let rec = th.calibration().unwrap();
    assert!(rec.floor_applied);
    assert!((rec.raw - 0.001).abs() < 1e-15);
}

#[test]
fn calibration_rejects_bad_input() {
    let calibrator = ThresholdCalibrator::new(ThresholdConfig::default()).unwrap();
    assert!(matches!(
        calibrator.calibrate(&[]),
        Err(EngineError::InsufficientData(_))
    ));
    assert!(matches!(
        calibrator.calibrate(&[0.1, f64::NAN]),
        Err(EngineError::NumericInstability(_))
    ));
    assert!(matches!(
        calibrator.calibrate(&[0.1, -0.2]),
        Err(EngineError::NumericInstability(_))
    ));
}

#[test]
fn calibrator_rejects_bad_config() {
    let bad = [
        ThresholdConfig {
            percentile: 101.0,
            ..ThresholdConfig::default()
        },
        ThresholdConfig {
            threshold_multiplier: -1.0,
            ..ThresholdConfig::default()
        },
        ThresholdConfig {
            min_threshold: 0.0,
            ..ThresholdConfig::default()
        },
    ];
    for c in bad {
        assert!(matches!(
            ThresholdCalibrator::new(c),
            Err(EngineError::Configuration(_))
        ));
    }
}

#[test]
fn calibration_record_survives_serialization() {
    let th = compute_threshold(&[0.1, 0.2, 0.3], &ThresholdConfig::default()).unwrap();
    let json = serde_json::to_string(&th).unwrap();
    assert!(json.contains("\"mode\":\"mean_std\""));
    let back: Threshold = serde_json::from_str(&json).unwrap();
    assert_eq!(back, th);
}

#[test]
fn threshold_deserialization_rejects_invalid_values() {
    for json in [r#"{"value":-1.0}"#, r#"{"value":0.0}"#, r#"{"value":null}"#] {
        assert!(serde_json::from_str::<Threshold>(json).is_err(), "{}", json);
    }
    let ok: Threshold = serde_json::from_str(r#"{"value":0.5}"#).unwrap();
    assert_eq!(ok.value(), 0.5);
    assert!(ok.calibration().is_none());
    assert_eq!(score(0.0, Some(&ok)).unwrap(), (0.0, false));
}

#[test]
fn huge_errors_calibrate_to_a_finite_threshold() {
    let th = compute_threshold(&[1e308, 1e308], &ThresholdConfig::default()).unwrap();
    assert_eq!(th.value(), 1e308);
    let json = serde_json::to_string(&th).unwrap();
    let back: Threshold = serde_json::from_str(&json).unwrap();
    assert_eq!(back, th);
}

#[test]
fn overflowing_threshold_is_numeric_instability() {
    let config = ThresholdConfig {
        threshold_multiplier: 3.0,
        ..ThresholdConfig::default()
    };
    assert!(matches!(
        compute_threshold(&[0.0, f64::MAX], &config),
        Err(EngineError::NumericInstability(_))
    ));
}
