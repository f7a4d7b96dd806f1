//! Validation tests for the joint therapy model.
//!
//! Validation targets:
//! | Property | Target |
//! |----------|--------|
//! | Therapy (1% O2, 42°C) | tumour eradicated within 200 h |
//! | Control (21% O2, 37°C) | tumour keeps growing, < 5% killed |
//! | Control engineered cells | washed out, held at exactly 0 once extinct |
//! | Broken scenario | reported as an error without hiding the other side |
//! | Every scenario | N_tumor + N_eng <= K, glutamate >= 0 |
//! | Repeated runs | identical trajectories |
//! | Lagged gate | same outcome through reconstitution kinetics |

use glufire::circuit::{
    ActivitySource, AndGate, DynamicGateParameters, EnvironmentSchedule, ReconstitutionGate,
};
use glufire::metabolism::{EngineeredStrain, GluMetabolism};
use glufire::numerics::{Signal, SolverSettings, Trajectory};
use glufire::therapy::{
    compare_conditions, compare_default_conditions, run_scenario, TherapyModel, TherapyParameters,
};

fn scenarios() -> [(&'static str, EnvironmentSchedule); 3] {
    [
        ("therapy", EnvironmentSchedule::constant(1.0, 42.0)),
        ("control", EnvironmentSchedule::constant(21.0, 37.0)),
        ("heat shock", EnvironmentSchedule::heat_shock(1.0, 37.0, 42.0, 8.0, 4.0)),
    ]
}

fn assert_glutamate_non_negative(traj: &Trajectory, names: &[&str], label: &str) {
    for name in names {
        let column = traj.column(name).unwrap();
        assert!(
            column.iter().all(|&v| v >= 0.0),
            "{} went negative in the {} run",
            name,
            label
        );
    }
}

// ============================================================================
// Therapy vs control
// ============================================================================

#[test]
fn test_therapy_outperforms_control() {
    let model = TherapyModel::default();
    let cmp = compare_default_conditions(&model, &SolverSettings::default());
    assert!(cmp.both_succeeded());

    let therapy = cmp.therapy.as_ref().unwrap();
    let control = cmp.control.as_ref().unwrap();

    assert!(therapy.t7_activity_AU > control.t7_activity_AU);
    assert!(
        therapy.peak_glu_extra_mM > 1.0,
        "Therapy should reach ferroptotic glutamate, peak {} mM",
        therapy.peak_glu_extra_mM
    );
    assert_eq!(therapy.final_tumor_cells, 0.0, "Tumour should be eradicated");
    assert!(therapy.kill_fraction() > 0.99);

    assert!(
        control.final_tumor_cells > 1e6,
        "Control tumour should keep growing, final {:.3e}",
        control.final_tumor_cells
    );
    assert!(control.kill_fraction() < 0.05, "Control kill {}", control.kill_fraction());
    assert_eq!(cmp.surviving_fraction_ratio(), Some(0.0));
}

#[test]
fn test_uninduced_engineered_cells_wash_out() {
    let model = TherapyModel::default();
    let control = EnvironmentSchedule::constant(21.0, 37.0);
    let traj = model.simulate(&control, &SolverSettings::default()).unwrap();
    let n_eng = traj.column("N_eng").unwrap();

    let first_extinct = n_eng
        .iter()
        .position(|&n| n == 0.0)
        .expect("engineered cells should go extinct under control conditions");
    assert!(
        n_eng[first_extinct..].iter().all(|&n| n == 0.0),
        "Extinct population must not regrow"
    );
    assert!(n_eng[..first_extinct].iter().all(|&n| n >= 1.0));
}

#[test]
fn test_populations_stay_non_negative() {
    let model = TherapyModel::default();
    let traj = model
        .simulate_with_signal(&Signal::constant(3000.0), &SolverSettings::default())
        .unwrap();
    for row in &traj.states {
        assert!(row.iter().all(|&v| v >= 0.0), "negative state {:?}", row);
    }
    // Dead cells only accumulate
    let dead = traj.column("D_tumor").unwrap();
    assert!(dead.windows(2).all(|w| w[1] >= w[0] - 1e-6 * w[0].abs().max(1.0)));
}

#[test]
fn test_broken_control_keeps_therapy_result() {
    let model = TherapyModel::default();
    let broken = EnvironmentSchedule {
        times_h: vec![0.0],
        o2_percent: vec![],
        temp_C: vec![37.0],
    };
    let cmp = compare_conditions(
        &model,
        &EnvironmentSchedule::constant(1.0, 42.0),
        &broken,
        &SolverSettings::default(),
    );
    assert!(cmp.therapy.is_ok());
    assert!(cmp.control.is_err());
    assert!(cmp.glutamate_ratio().is_none());
}

// ============================================================================
// Invariants over every scenario
// ============================================================================

#[test]
fn test_populations_respect_shared_capacity() {
    // Start close to capacity so the bound is actually exercised
    let crowded = TherapyModel::new(
        TherapyParameters {
            initial_tumor_cells: 9e8,
            ..TherapyParameters::default()
        },
        AndGate::default(),
    );
    for model in [TherapyModel::default(), crowded] {
        let capacity = model.params.K_capacity;
        for (label, env) in scenarios() {
            let traj = model.simulate(&env, &SolverSettings::default()).unwrap();
            let tumour = traj.column("N_tumor").unwrap();
            let engineered = traj.column("N_eng").unwrap();
            for (i, (n, e)) in tumour.iter().zip(&engineered).enumerate() {
                assert!(
                    n + e <= capacity * (1.0 + 1e-4),
                    "{} run exceeds capacity at t = {} h: {:.6e}",
                    label,
                    traj.t[i],
                    n + e
                );
            }
        }
    }
}

#[test]
fn test_glutamate_non_negative_in_every_scenario() {
    let model = TherapyModel::default();
    for (label, env) in scenarios() {
        let traj = model.simulate(&env, &SolverSettings::default()).unwrap();
        assert_glutamate_non_negative(&traj, &["Glu_intra_mM", "Glu_extra_mM"], label);
    }

    let minimal = GluMetabolism::default()
        .simulate(&Signal::heat_shock_protocol(), 24.0, 0.1, None, &SolverSettings::default())
        .unwrap();
    assert_glutamate_non_negative(&minimal, &["Glu_intra_mM", "Glu_extra_mM"], "minimal heat shock");

    for strain in [EngineeredStrain::engineered(), EngineeredStrain::wildtype()] {
        let traj = strain.simulate_heat_shock().unwrap();
        assert_glutamate_non_negative(&traj, &["Glu_in_mM", "Glu_ext_mM"], "strain heat shock");
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let settings = SolverSettings::default();

    let model = TherapyModel::default();
    let env = EnvironmentSchedule::heat_shock(1.0, 37.0, 42.0, 8.0, 4.0);
    assert_eq!(
        model.simulate(&env, &settings).unwrap(),
        model.simulate(&env, &settings).unwrap()
    );

    let minimal = GluMetabolism::default();
    let t7 = Signal::heat_shock_protocol();
    assert_eq!(
        minimal.simulate(&t7, 24.0, 0.1, None, &settings).unwrap(),
        minimal.simulate(&t7, 24.0, 0.1, None, &settings).unwrap()
    );

    let strain = EngineeredStrain::engineered();
    assert_eq!(
        strain.simulate_heat_shock().unwrap(),
        strain.simulate_heat_shock().unwrap()
    );
}

// ============================================================================
// Gate variants
// ============================================================================

#[test]
fn test_therapy_through_reconstitution_kinetics() {
    let gate = AndGate::default();
    let lagged = ReconstitutionGate::new(
        gate.clone(),
        DynamicGateParameters::matched_to(&gate.gate, 2.0),
    );
    let env = EnvironmentSchedule::constant(1.0, 42.0);
    let params = TherapyParameters::default();

    let signal = lagged.activity_signal(&env, params.t_end_h).unwrap();
    assert_eq!(signal.value_at(0.0), gate.gate.leaky);
    assert!(signal.value_at(params.t_end_h) > gate.activity(1.0, 42.0));

    let settings = SolverSettings::default();
    let instant_model = TherapyModel::new(params.clone(), gate);
    let lagged_model = TherapyModel::new(params, lagged);
    let instant = run_scenario(&instant_model, "instant", &env, &settings).unwrap();
    let delayed = run_scenario(&lagged_model, "lagged", &env, &settings).unwrap();

    assert_eq!(instant.final_tumor_cells, 0.0);
    assert_eq!(delayed.final_tumor_cells, 0.0, "Lagged gate should still eradicate the tumour");
    assert!(delayed.kill_fraction() > 0.99);
    assert!(delayed.t7_activity_AU > instant.t7_activity_AU);
}
