//! Validation tests for promoter and gate calibration.
//!
//! Validation targets:
//! | Property | Target |
//! |----------|--------|
//! | Noisy pL/pR curve (3% CV) | K within 1 °C of 40, R² > 0.95 |
//! | Noisy pPept curve (3% CV) | repressing detected, K within 1.5 % of 5 |
//! | CSV replicates | averaged per level, sorted by input |
//! | Fit -> calibration store -> AND gate | fitted parameters reach the gate |

use std::io::Write;

use glufire::circuit::{
    fit_gate, fit_promoter, load_dose_response_csv, synthetic, AndGate, DoseResponse, FitMode,
    FitOptions, GateParameters, HillParameters, PromoterMode,
};
use glufire::config::{CalibrationStore, HEAT_PROMOTER, OXYGEN_PROMOTER, SPLIT_T7};
use glufire::GlufireError;

// ============================================================================
// Round trips through synthetic measurements
// ============================================================================

#[test]
fn test_noisy_heat_promoter_fit() {
    let truth = HillParameters::lr_heat();
    let data = synthetic::dose_response(&truth, &synthetic::TEMPERATURE_LEVELS, 3, 0.03, 2024).unwrap();
    let fit = fit_promoter(&data, FitMode::Auto, &FitOptions::default())
        .unwrap()
        .expect("fit on 9 levels should converge");

    assert_eq!(fit.params.mode, PromoterMode::Activating);
    assert!(
        (fit.params.K - 40.0).abs() < 1.0,
        "K should be near 40 °C, got {}",
        fit.params.K
    );
    assert!(fit.r_squared > 0.95, "R² should exceed 0.95, got {}", fit.r_squared);
    assert!(fit.params.n >= 0.1 && fit.params.n <= 10.0, "n out of bounds: {}", fit.params.n);
}

#[test]
fn test_noisy_oxygen_promoter_fit() {
    let truth = HillParameters::pept_oxygen();
    let data = synthetic::dose_response(&truth, &synthetic::OXYGEN_LEVELS, 3, 0.03, 11).unwrap();
    let fit = fit_promoter(&data, FitMode::Auto, &FitOptions::default())
        .unwrap()
        .expect("fit on 8 levels should converge");

    assert_eq!(fit.params.mode, PromoterMode::Repressing);
    assert!(
        (fit.params.K - 5.0).abs() < 1.5,
        "K should be near 5 % O2, got {}",
        fit.params.K
    );
    assert!(fit.params.beta >= 0.0 && fit.params.leaky >= 0.0);
}

#[test]
fn test_constant_data_rejected_with_few_levels() {
    let data = DoseResponse::new(vec![1.0, 1.0, 2.0], vec![5.0, 5.0, 5.0]).unwrap();
    match fit_promoter(&data, FitMode::Activating, &FitOptions::default()) {
        Err(GlufireError::InsufficientData { needed, got }) => {
            assert_eq!(needed, 4);
            assert_eq!(got, 2);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_gate_fit_from_arm_outputs() {
    let gate = AndGate::default();
    let mut arm_a = Vec::new();
    let mut arm_b = Vec::new();
    let mut activity = Vec::new();
    for o2 in [0.5, 1.0, 5.0, 10.0, 21.0] {
        for temp in [35.0, 38.0, 40.0, 42.0, 45.0] {
            let (a, b) = gate.arm_outputs(o2, temp);
            arm_a.push(a);
            arm_b.push(b);
            activity.push(gate.activity(o2, temp));
        }
    }
    let fit = fit_gate(&arm_a, &arm_b, &activity, &FitOptions::default())
        .unwrap()
        .expect("noise-free gate fit should converge");
    assert!(fit.r_squared > 0.99, "R² = {}", fit.r_squared);
    assert!(
        (fit.params.alpha - 2500.0).abs() / 2500.0 < 0.1,
        "alpha = {}",
        fit.params.alpha
    );
}

// ============================================================================
// CSV input
// ============================================================================

#[test]
fn test_csv_replicates_are_averaged() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "O2_percent,reporter_MEFL,plate").unwrap();
    for (x, y) in [(21.0, 100.0), (0.0, 1300.0), (21.0, 120.0), (0.0, 1250.0), (5.0, 640.0)] {
        writeln!(file, "{},{},1", x, y).unwrap();
    }
    file.flush().unwrap();

    let data = load_dose_response_csv(file.path(), "O2_percent", "reporter_MEFL").unwrap();
    assert_eq!(data.x, vec![0.0, 5.0, 21.0]);
    assert_eq!(data.y, vec![1275.0, 640.0, 110.0]);
}

#[test]
fn test_csv_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "temp_C,signal").unwrap();
    writeln!(file, "37,abc").unwrap();
    file.flush().unwrap();

    assert!(load_dose_response_csv(file.path(), "temp_C", "missing").is_err());
    assert!(load_dose_response_csv(file.path(), "temp_C", "signal").is_err());
}

// ============================================================================
// Fit -> store -> gate
// ============================================================================

#[test]
fn test_fitted_promoter_reaches_gate_through_store() {
    let truth = HillParameters {
        K: 41.0,
        ..HillParameters::lr_heat()
    };
    let data = synthetic::dose_response(&truth, &synthetic::TEMPERATURE_LEVELS, 2, 0.0, 3).unwrap();
    let fit = fit_promoter(&data, FitMode::Activating, &FitOptions::default())
        .unwrap()
        .expect("exact data should fit");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let mut store = CalibrationStore::builtin();
    store.insert_fit(HEAT_PROMOTER, &fit);
    store.save(&path).unwrap();

    let reloaded = CalibrationStore::load(&path).unwrap();
    let heat = reloaded.get_promoter(HEAT_PROMOTER).unwrap();
    assert!((heat.K - fit.params.K).abs() < 1e-9 * fit.params.K);
    assert_eq!(heat.mode, PromoterMode::Activating);
    assert_eq!(reloaded.get_promoter(OXYGEN_PROMOTER).unwrap(), HillParameters::pept_oxygen());
    assert_eq!(reloaded.get_gate(SPLIT_T7).unwrap(), GateParameters::default());

    // Shifted heat threshold lowers activity at 40 °C compared to the built-in gate
    let calibrated = reloaded.and_gate();
    assert!(calibrated.activity(1.0, 40.0) < AndGate::default().activity(1.0, 40.0));
}
