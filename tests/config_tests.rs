//! Configuration files, calibration fallbacks and exports on disk.

use std::io::Write;

use glufire::config::{CalibrationStore, ModelConfig, HEAT_PROMOTER, SPLIT_T7};
use glufire::export::{export_report_json_to, export_trajectory_csv};
use glufire::metabolism::GluMetabolism;
use glufire::numerics::{Signal, SolverSettings};
use glufire::pk::ToxicityThresholds;
use glufire::{AndGate, HillParameters};

// ============================================================================
// Model configuration
// ============================================================================

#[test]
fn test_override_file_changes_only_named_keys() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "therapy": {{ "k_ferroptosis_max_per_h": 5.0, "t_end_h": 96.0 }},
            "toxicity": {{ "caution_uM": 80.0 }},
            "solver": {{ "rtol": 1e-5 }}
        }}"#
    )
    .unwrap();
    file.flush().unwrap();

    let config = ModelConfig::load_with_overrides(file.path()).unwrap();
    let defaults = ModelConfig::default();

    assert_eq!(config.therapy.k_ferroptosis_max_per_h, 5.0);
    assert_eq!(config.therapy.t_end_h, 96.0);
    assert_eq!(config.therapy.r_tumor_per_h, defaults.therapy.r_tumor_per_h);
    assert_eq!(config.therapy.glu, defaults.therapy.glu);
    assert_eq!(config.toxicity.caution_uM, 80.0);
    assert_eq!(config.toxicity.danger_uM, defaults.toxicity.danger_uM);
    assert_eq!(config.solver.rtol, 1e-5);
    assert_eq!(config.solver.kind, defaults.solver.kind);
    assert_eq!(config.pk, defaults.pk);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ModelConfig::load_with_overrides(dir.path().join("absent.json")).unwrap();
    assert_eq!(config, ModelConfig::default());
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ \"therapy\": ").unwrap();
    file.flush().unwrap();
    assert!(ModelConfig::load_with_overrides(file.path()).is_err());
}

#[test]
fn test_saved_config_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let mut config = ModelConfig::default();
    config.therapy.initial_tumor_cells = 2.5e6;
    config.toxicity.danger_uM = 750.0;
    config.save(&path).unwrap();

    let reloaded = ModelConfig::load_with_overrides(&path).unwrap();
    assert_eq!(reloaded.therapy.initial_tumor_cells, 2.5e6);
    assert_eq!(reloaded.toxicity.danger_uM, 750.0);
    assert_eq!(reloaded.engineered_strain.schedule, config.engineered_strain.schedule);
}

// ============================================================================
// Calibration
// ============================================================================

#[test]
fn test_calibration_fallbacks() {
    let dir = tempfile::tempdir().unwrap();
    let missing = CalibrationStore::load_or_default(dir.path().join("none.json"));
    assert_eq!(missing, CalibrationStore::builtin());

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "not json").unwrap();
    assert_eq!(CalibrationStore::load_or_default(&broken), CalibrationStore::builtin());
    assert!(CalibrationStore::load(&broken).is_err());
}

#[test]
fn test_calibration_file_feeds_config_gate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    std::fs::write(
        &path,
        r#"{
            "_comment": "bench fit",
            "pLR": { "beta": 800.0, "K": 41.5, "n": 8.0, "leaky": 20.0, "type": "activating" },
            "splitT7": { "alpha": 3000.0, "Kd": 1.0e5, "leaky": 0.0 }
        }"#,
    )
    .unwrap();

    let store = CalibrationStore::load(&path).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get_promoter(HEAT_PROMOTER).unwrap().K, 41.5);
    assert_eq!(store.get_gate(SPLIT_T7).unwrap().alpha, 3000.0);

    let config = ModelConfig::default().with_calibration(&store);
    // The oxygen arm is missing from the file and falls back to the built-in promoter
    let expected = AndGate::from_promoters(
        HillParameters::pept_oxygen(),
        store.get_promoter(HEAT_PROMOTER).unwrap(),
        store.get_gate(SPLIT_T7).unwrap(),
    );
    assert_eq!(config.and_gate, expected);
    assert_ne!(config.and_gate, AndGate::default());
}

// ============================================================================
// Exports
// ============================================================================

#[test]
fn test_trajectory_and_report_exports() {
    let dir = tempfile::tempdir().unwrap();
    let traj = GluMetabolism::default()
        .simulate(&Signal::constant(2000.0), 2.0, 0.5, None, &SolverSettings::default())
        .unwrap();

    let csv_path = dir.path().join("glu.csv");
    export_trajectory_csv(&traj, "glu", Some(&csv_path)).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "t_h,Glu_intra_mM,Glu_extra_mM,Icd,gdhA");
    assert_eq!(lines.len(), traj.len() + 1);

    let json_path = dir.path().join("thresholds.json");
    export_report_json_to(&ToxicityThresholds::default(), &json_path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["report"]["danger_uM"], 1000.0);
}
