//! Three-compartment glutamate pharmacokinetics.
//!
//! Compartments: plasma (b), tumour interstitium (t), lumped normal tissue (n),
//! all in µM. Exchange with plasma is mass-conserving, so the concentration
//! change in the smaller compartment is scaled by the volume ratio:
//!
//! dCb/dt = -k_bt (Cb - Ct) - k_bn (Cb - Cn) - k_b_clr (Cb - C0)
//! dCt/dt = (Vb/Vt) k_bt (Cb - Ct) - k_t_clr (Ct - C0) + S(t)/Vt
//! dCn/dt = (Vb/Vn) k_bn (Cb - Cn) - k_n_clr (Cn - C0)
//!
//! S(t) is the tumour secretion flux in µmol/h, linearly interpolated between
//! the samples it is given on. Every clearance relaxes to the physiological
//! baseline C0, so with S = 0 a system started at baseline stays there.
//!
//! Reference: Rowland M, Tozer TN. Clinical Pharmacokinetics and Pharmacodynamics. 4th ed. 2011

use serde::{Deserialize, Serialize};

use crate::error::{GlufireError, Result};
use crate::numerics::signal::{Interpolation, Signal};
use crate::numerics::{integrate, OdeSystem, SolverSettings, Trajectory};

/// Field names of the three-compartment state
pub const PK_STATE_NAMES: [&str; 3] = ["C_blood_uM", "C_tumor_uM", "C_normal_uM"];

/// Physiological plasma glutamate (µM)
pub const DEFAULT_BASELINE_UM: f64 = 50.0;

/// Volumes and rate constants (mouse-scale)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PkParameters {
    /// Plasma volume (L)
    pub Vb_L: f64,
    /// Tumour interstitial volume (L)
    pub Vt_L: f64,
    /// Normal tissue volume (L)
    pub Vn_L: f64,
    /// Blood-tumour exchange (1/h)
    pub k_bt_per_h: f64,
    /// Blood-normal tissue exchange (1/h)
    pub k_bn_per_h: f64,
    pub k_b_clr_per_h: f64,
    pub k_t_clr_per_h: f64,
    pub k_n_clr_per_h: f64,
}

impl Default for PkParameters {
    fn default() -> Self {
        Self {
            Vb_L: 0.002,
            Vt_L: 0.0005,
            Vn_L: 0.02,
            k_bt_per_h: 1.0,
            k_bn_per_h: 0.5,
            k_b_clr_per_h: 0.5,
            k_t_clr_per_h: 0.2,
            k_n_clr_per_h: 0.2,
        }
    }
}

impl PkParameters {
    /// Weak blood-tumour coupling and slow tumour clearance
    ///
    /// Keeps a high tumour load from washing out instantly, which makes it the
    /// pessimistic case for plasma exposure time.
    pub fn worst_case() -> Self {
        Self {
            k_bt_per_h: 1e-3,
            k_t_clr_per_h: 0.05,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("Vb_L", self.Vb_L), ("Vt_L", self.Vt_L), ("Vn_L", self.Vn_L)] {
            if !(v > 0.0) || !v.is_finite() {
                return Err(GlufireError::invalid(format!("{} must be > 0, got {}", name, v)));
            }
        }
        let rates = [
            self.k_bt_per_h,
            self.k_bn_per_h,
            self.k_b_clr_per_h,
            self.k_t_clr_per_h,
            self.k_n_clr_per_h,
        ];
        if rates.iter().any(|k| !(*k >= 0.0) || !k.is_finite()) {
            return Err(GlufireError::invalid("PK rate constants must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Initial concentrations (µM)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialConcentrations {
    pub blood_uM: f64,
    pub tumor_uM: f64,
    pub normal_uM: f64,
}

impl InitialConcentrations {
    /// Every compartment at the same level
    pub fn uniform(level_uM: f64) -> Self {
        Self {
            blood_uM: level_uM,
            tumor_uM: level_uM,
            normal_uM: level_uM,
        }
    }

    fn as_array(&self) -> [f64; 3] {
        [self.blood_uM, self.tumor_uM, self.normal_uM]
    }
}

/// Solver settings used for PK runs
pub fn default_pk_solver() -> SolverSettings {
    SolverSettings::dormand_prince(1e-6, 1e-9)
}

struct ThreeCompartment<'a> {
    params: &'a PkParameters,
    flux: Signal,
    baseline_uM: f64,
}

impl OdeSystem for ThreeCompartment<'_> {
    fn ndim(&self) -> usize {
        3
    }

    fn state_names(&self) -> &'static [&'static str] {
        &PK_STATE_NAMES
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        let p = self.params;
        let (cb, ct, cn) = (y[0], y[1], y[2]);
        let c0 = self.baseline_uM;
        let s = self.flux.value_at(t);

        dydt[0] = -p.k_bt_per_h * (cb - ct) - p.k_bn_per_h * (cb - cn) - p.k_b_clr_per_h * (cb - c0);
        dydt[1] = (p.Vb_L / p.Vt_L) * p.k_bt_per_h * (cb - ct) - p.k_t_clr_per_h * (ct - c0) + s / p.Vt_L;
        dydt[2] = (p.Vb_L / p.Vn_L) * p.k_bn_per_h * (cb - cn) - p.k_n_clr_per_h * (cn - c0);
    }

    fn project(&self, y: &mut [f64]) {
        for v in y.iter_mut() {
            *v = v.max(0.0);
        }
    }
}

/// Integrate the three compartments on `grid` driven by `flux_umol_per_h`
///
/// `flux_umol_per_h` is sampled on the same grid. The result has columns
/// C_blood_uM, C_tumor_uM and C_normal_uM.
pub fn simulate_pk(
    grid: &[f64],
    flux_umol_per_h: &[f64],
    params: &PkParameters,
    initial: InitialConcentrations,
    baseline_uM: f64,
    settings: &SolverSettings,
) -> Result<Trajectory> {
    params.validate()?;
    if grid.len() != flux_umol_per_h.len() {
        return Err(GlufireError::invalid(format!(
            "flux has {} samples but the time grid has {}",
            flux_umol_per_h.len(),
            grid.len()
        )));
    }
    let flux = Signal::sampled(grid.to_vec(), flux_umol_per_h.to_vec(), Interpolation::Linear)?;
    let system = ThreeCompartment {
        params,
        flux,
        baseline_uM,
    };
    let traj = integrate(&system, &initial.as_array(), grid, settings)?;
    log::debug!(
        "PK run: {} samples, final plasma {:.2} µM",
        traj.len(),
        traj.last().map(|s| s[0]).unwrap_or(f64::NAN)
    );
    Ok(traj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::stats;

    #[test]
    fn test_baseline_is_fixed_point() {
        let grid = stats::linspace(0.0, 24.0, 241);
        let flux = vec![0.0; grid.len()];
        let traj = simulate_pk(
            &grid,
            &flux,
            &PkParameters::default(),
            InitialConcentrations::uniform(DEFAULT_BASELINE_UM),
            DEFAULT_BASELINE_UM,
            &default_pk_solver(),
        )
        .unwrap();
        for row in &traj.states {
            for v in row {
                assert!((v - DEFAULT_BASELINE_UM).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_tumor_load_spills_into_plasma() {
        let grid = stats::linspace(0.0, 12.0, 121);
        let flux = vec![0.0; grid.len()];
        let initial = InitialConcentrations {
            tumor_uM: 30_000.0,
            ..InitialConcentrations::uniform(DEFAULT_BASELINE_UM)
        };
        let traj = simulate_pk(
            &grid,
            &flux,
            &PkParameters::default(),
            initial,
            DEFAULT_BASELINE_UM,
            &default_pk_solver(),
        )
        .unwrap();
        let cb = traj.column("C_blood_uM").unwrap();
        assert!(traj.max_of("C_blood_uM").unwrap() > 100.0);
        // Plasma returns toward baseline once the tumour is drained
        assert!(cb.last().unwrap() < &traj.max_of("C_blood_uM").unwrap());
    }

    #[test]
    fn test_rejects_mismatched_flux() {
        let grid = [0.0, 1.0, 2.0];
        let res = simulate_pk(
            &grid,
            &[0.0, 0.0],
            &PkParameters::default(),
            InitialConcentrations::uniform(50.0),
            50.0,
            &default_pk_solver(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_worst_case_rates() {
        let p = PkParameters::worst_case();
        assert_eq!(p.k_bt_per_h, 1e-3);
        assert_eq!(p.k_t_clr_per_h, 0.05);
        assert_eq!(p.Vb_L, 0.002);
    }
}
