//! Systemic glutamate exposure and neurotoxicity.
//!
//! Submodules:
//! - `compartment`: plasma / tumour / normal-tissue PK with baseline clearance
//! - `flux`: tumour secretion profiles (trapezoid or derived from a glutamate series)
//! - `toxicity`: threshold-based risk report
//! - `multi`: whole-body flow-limited four-compartment model
//!
//! Plasma concentrations are µM; glutamate model outputs are mM.

pub mod compartment;
pub mod flux;
pub mod multi;
pub mod toxicity;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::numerics::{stats, SolverSettings, Trajectory};

pub use compartment::{
    default_pk_solver, simulate_pk, InitialConcentrations, PkParameters, DEFAULT_BASELINE_UM,
    PK_STATE_NAMES,
};
pub use flux::{derive_secretion_flux, FluxOptions, TrapezoidFlux};
pub use multi::{MultiCompartmentParameters, MultiCompartmentPk, MULTI_STATE_NAMES};
pub use toxicity::{assess_risk, RiskLevel, RiskReport, ToxicityThresholds};

/// PK trajectory, the flux that drove it and the resulting risk report
#[derive(Debug, Clone, Serialize)]
pub struct NeurotoxResult {
    pub t_h: Vec<f64>,
    pub flux_umol_per_h: Vec<f64>,
    #[serde(skip)]
    pub trajectory: Trajectory,
    pub report: RiskReport,
}

fn run_and_assess(
    grid: Vec<f64>,
    flux: Vec<f64>,
    params: &PkParameters,
    initial: InitialConcentrations,
    baseline_uM: f64,
    thresholds: &ToxicityThresholds,
    settings: &SolverSettings,
) -> Result<NeurotoxResult> {
    let trajectory = simulate_pk(&grid, &flux, params, initial, baseline_uM, settings)?;
    let plasma = trajectory.column("C_blood_uM")?;
    let report = assess_risk(&plasma, &grid, thresholds)?;
    Ok(NeurotoxResult {
        t_h: grid,
        flux_umol_per_h: flux,
        trajectory,
        report,
    })
}

/// Drive the PK model with the secretion implied by a Glu_extra series
///
/// All compartments start at `baseline_uM`.
#[allow(clippy::too_many_arguments)]
pub fn run_neurotox_from_glu_series(
    t_h: &[f64],
    glu_extra_mM: &[f64],
    V_ext_L: f64,
    flux_options: &FluxOptions,
    params: &PkParameters,
    thresholds: &ToxicityThresholds,
    baseline_uM: f64,
    settings: &SolverSettings,
) -> Result<NeurotoxResult> {
    let flux = derive_secretion_flux(t_h, glu_extra_mM, V_ext_L, flux_options)?;
    run_and_assess(
        t_h.to_vec(),
        flux,
        params,
        InitialConcentrations::uniform(baseline_uM),
        baseline_uM,
        thresholds,
        settings,
    )
}

/// Stand-alone exposure scenario: an initial tumour load plus a trapezoid secretion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeurotoxScenario {
    pub hours: f64,
    pub dt_h: f64,
    pub baseline_uM: f64,
    /// Initial tumour interstitial glutamate (mM)
    pub tumor_init_mM: f64,
    pub secretion: TrapezoidFlux,
    pub params: PkParameters,
}

impl Default for NeurotoxScenario {
    fn default() -> Self {
        Self::worst_case()
    }
}

impl NeurotoxScenario {
    /// 30 mM tumour load, weak blood-tumour coupling, 48 h at 0.1 h
    pub fn worst_case() -> Self {
        Self {
            hours: 48.0,
            dt_h: 0.1,
            baseline_uM: DEFAULT_BASELINE_UM,
            tumor_init_mM: 30.0,
            secretion: TrapezoidFlux::default(),
            params: PkParameters::worst_case(),
        }
    }

    /// Same scenario with the tumour at baseline and no secretion
    pub fn control(&self) -> Self {
        Self {
            tumor_init_mM: self.baseline_uM / 1000.0,
            secretion: TrapezoidFlux {
                peak_umol_per_h: 0.0,
                ..self.secretion.clone()
            },
            ..self.clone()
        }
    }

    /// Output grid 0, dt, ..., hours
    pub fn grid(&self) -> Vec<f64> {
        let n = (self.hours / self.dt_h).round() as usize + 1;
        stats::linspace(0.0, self.hours, n.max(2))
    }

    pub fn run(&self, thresholds: &ToxicityThresholds, settings: &SolverSettings) -> Result<NeurotoxResult> {
        self.secretion.validate()?;
        let grid = self.grid();
        let flux = self.secretion.sample(&grid);
        let initial = InitialConcentrations {
            tumor_uM: self.tumor_init_mM * 1000.0,
            ..InitialConcentrations::uniform(self.baseline_uM)
        };
        log::info!(
            "Neurotox run: tumour {:.1} mM, peak secretion {:.1} µmol/h, {} h",
            self.tumor_init_mM,
            self.secretion.peak_umol_per_h,
            self.hours
        );
        run_and_assess(grid, flux, &self.params, initial, self.baseline_uM, thresholds, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_scenario_is_safe() {
        let scenario = NeurotoxScenario::worst_case().control();
        let res = scenario
            .run(&ToxicityThresholds::default(), &default_pk_solver())
            .unwrap();
        assert_eq!(res.report.level(), RiskLevel::Safe);
        assert!((res.report.max_plasma_uM - DEFAULT_BASELINE_UM).abs() < 1e-6);
    }

    #[test]
    fn test_grid_includes_end() {
        let grid = NeurotoxScenario::worst_case().grid();
        assert_eq!(grid.len(), 481);
        assert_eq!(*grid.last().unwrap(), 48.0);
    }

    #[test]
    fn test_flat_series_gives_baseline_plasma() {
        let t = stats::linspace(0.0, 24.0, 97);
        let glu = vec![2.0; t.len()];
        let res = run_neurotox_from_glu_series(
            &t,
            &glu,
            0.01,
            &FluxOptions::default(),
            &PkParameters::default(),
            &ToxicityThresholds::default(),
            DEFAULT_BASELINE_UM,
            &default_pk_solver(),
        )
        .unwrap();
        assert!(res.flux_umol_per_h.iter().all(|v| v.abs() < 1e-9));
        assert!(!res.report.flag_caution);
    }
}
