//! Minimal T7-driven glutamate overproduction model.
//!
//! State: [Glu_intra, Glu_extra, Icd, gdhA]
//!
//! d[Icd]/dt  = k_syn_icd  * H(T7) - k_deg_icd  * [Icd]
//! d[gdhA]/dt = k_syn_gdhA * H(T7) - k_deg_gdhA * [gdhA]
//! d[Glu_in]/dt  = Vmax_gdhA * [gdhA] - v_export - k_dil * [Glu_in]
//! d[Glu_out]/dt = v_export * V_ratio - k_dil * [Glu_out]
//!
//! with H(T7) = T7^n / (K_t7^n + T7^n) and Michaelis-Menten export
//! v_export = k_export_max * [Glu_in] / (K_export + [Glu_in]).
//!
//! Enzyme levels follow the inducer with a first-order lag of 1/k_deg hours.
//! Icd is tracked as an expression readout; production is carried by gdhA.
//!
//! References:
//! - Sano C. Am J Clin Nutr. 2009;90:728S-732S (glutamate overproduction)
//! - Alon U. An Introduction to Systems Biology. 2nd ed. CRC Press, 2019 (Ch. 1)

use serde::{Deserialize, Serialize};

use super::ProducerPopulation;
use crate::error::{GlufireError, Result};
use crate::numerics::kinetics::{hill_activation, michaelis_menten};
use crate::numerics::signal::Signal;
use crate::numerics::{integrate, stats, OdeSystem, SolverSettings, Trajectory};

/// Field names of the minimal state vector
pub const GLU_STATE_NAMES: [&str; 4] = ["Glu_intra_mM", "Glu_extra_mM", "Icd", "gdhA"];

/// Rate constants of the minimal model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GluParameters {
    /// Maximum export rate (mM/h)
    pub k_export_max: f64,
    /// Export half-saturation (mM)
    pub K_export: f64,
    /// Growth dilution / loss (1/h)
    pub k_dilution: f64,
    /// Intracellular to extracellular volume ratio used by `VolumeCoupling::Fixed`
    pub V_ratio: f64,
    pub k_syn_icd: f64,
    pub k_syn_gdhA: f64,
    /// Enzyme turnover (1/h)
    pub k_deg_icd: f64,
    pub k_deg_gdhA: f64,
    /// Glutamate produced per unit gdhA (mM/h/AU)
    pub Vmax_gdhA: f64,
    /// T7 activity giving half-maximal induction (AU)
    pub K_t7: f64,
    pub n_hill: f64,
}

impl Default for GluParameters {
    fn default() -> Self {
        Self {
            k_export_max: 100.0,
            K_export: 10.0,
            k_dilution: 0.1,
            V_ratio: 0.01,
            k_syn_icd: 2.0,
            k_syn_gdhA: 2.0,
            k_deg_icd: 0.2,
            k_deg_gdhA: 0.2,
            Vmax_gdhA: 100.0,
            K_t7: 500.0,
            n_hill: 4.0,
        }
    }
}

impl GluParameters {
    /// Tuned set with a higher induction threshold and a faster enzyme turnover
    pub fn optimized() -> Self {
        Self {
            K_t7: 800.0,
            k_syn_icd: 5.0,
            k_syn_gdhA: 5.0,
            k_deg_icd: 0.3,
            k_deg_gdhA: 0.3,
            k_dilution: 0.15,
            K_export: 5.0,
            Vmax_gdhA: 50.0,
            n_hill: 3.0,
            ..Self::default()
        }
    }

    /// Fraction of maximal enzyme induction at a given T7 activity
    pub fn induction(&self, t7: f64) -> f64 {
        hill_activation(t7, self.K_t7, self.n_hill)
    }

    /// Export flux out of the cell (mM/h of intracellular volume)
    pub fn export_rate(&self, glu_intra: f64) -> f64 {
        michaelis_menten(self.k_export_max, self.K_export, glu_intra)
    }

    /// Enzyme levels (Icd, gdhA) reached under a constant T7 activity
    pub fn enzyme_steady_state(&self, t7: f64) -> (f64, f64) {
        let h = self.induction(t7);
        (
            self.k_syn_icd * h / self.k_deg_icd,
            self.k_syn_gdhA * h / self.k_deg_gdhA,
        )
    }

    /// Derivatives of the four glutamate states at one T7 level
    ///
    /// `glu` and `dydt` are [Glu_intra, Glu_extra, Icd, gdhA]. The volume
    /// ratio is passed in so that a coupled population can supply it.
    pub fn derivatives(&self, t7: f64, glu: &[f64], v_ratio: f64, dydt: &mut [f64]) {
        let glu_intra = glu[0].max(0.0);
        let glu_extra = glu[1].max(0.0);
        let icd = glu[2];
        let gdh = glu[3].max(0.0);

        let h = self.induction(t7);
        let v_prod = self.Vmax_gdhA * gdh;
        let v_export = self.export_rate(glu_intra);

        dydt[0] = v_prod - v_export - self.k_dilution * glu_intra;
        dydt[1] = v_export * v_ratio - self.k_dilution * glu_extra;
        dydt[2] = self.k_syn_icd * h - self.k_deg_icd * icd;
        dydt[3] = self.k_syn_gdhA * h - self.k_deg_gdhA * glu[3];
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("K_export", self.K_export),
            ("k_deg_icd", self.k_deg_icd),
            ("k_deg_gdhA", self.k_deg_gdhA),
            ("K_t7", self.K_t7),
            ("n_hill", self.n_hill),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(GlufireError::invalid(format!("{} must be > 0, got {}", name, value)));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Volume coupling
// ============================================================================

/// Source of the intracellular/extracellular volume ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeCoupling {
    /// Constant ratio
    Fixed { ratio: f64 },
    /// N_producers * V_cell / V_ext, re-evaluated at every derivative call
    Producers {
        cell_volume_L: f64,
        extracellular_volume_L: f64,
    },
}

impl VolumeCoupling {
    /// Lower bound on a population-derived ratio
    pub const MIN_RATIO: f64 = 1e-12;

    /// Ratio for the current number of producer cells
    pub fn ratio(&self, producers: f64) -> f64 {
        match self {
            VolumeCoupling::Fixed { ratio } => *ratio,
            VolumeCoupling::Producers {
                cell_volume_L,
                extracellular_volume_L,
            } => (producers.max(0.0) * cell_volume_L / extracellular_volume_L).max(Self::MIN_RATIO),
        }
    }
}

// ============================================================================
// Standalone model
// ============================================================================

/// Minimal glutamate model with a fixed producer population
#[derive(Debug, Clone)]
pub struct GluMetabolism {
    pub params: GluParameters,
    pub coupling: VolumeCoupling,
    /// Producer cells feeding the extracellular pool (used by `Producers` coupling)
    pub producers: f64,
}

impl Default for GluMetabolism {
    fn default() -> Self {
        Self::new(GluParameters::default())
    }
}

impl ProducerPopulation for GluMetabolism {
    fn producer_count(&self, _y: &[f64]) -> f64 {
        self.producers
    }
}

impl GluMetabolism {
    /// Model using the parameter set's own fixed volume ratio
    pub fn new(params: GluParameters) -> Self {
        let coupling = VolumeCoupling::Fixed {
            ratio: params.V_ratio,
        };
        Self {
            params,
            coupling,
            producers: 0.0,
        }
    }

    pub fn with_coupling(params: GluParameters, coupling: VolumeCoupling, producers: f64) -> Self {
        Self {
            params,
            coupling,
            producers,
        }
    }

    /// d(state)/dt at time t for the given activity input
    pub fn derivative(&self, t: f64, y: &[f64], activity: &Signal) -> [f64; 4] {
        let mut dydt = [0.0; 4];
        let ratio = self.coupling.ratio(self.producer_count(y));
        self.params.derivatives(activity.value_at(t), y, ratio, &mut dydt);
        dydt
    }

    /// Integrate on [0, t_end) sampled every `dt_h`
    ///
    /// `y0` defaults to all zeros.
    pub fn simulate(
        &self,
        activity: &Signal,
        t_end_h: f64,
        dt_h: f64,
        y0: Option<[f64; 4]>,
        settings: &SolverSettings,
    ) -> Result<Trajectory> {
        self.params.validate()?;
        if !(dt_h > 0.0) || !(t_end_h > dt_h) {
            return Err(GlufireError::invalid(format!(
                "need 0 < dt ({}) < t_end ({})",
                dt_h, t_end_h
            )));
        }
        let grid = stats::arange(0.0, t_end_h, dt_h);
        let system = GluSystem {
            model: self,
            activity,
        };
        integrate(&system, &y0.unwrap_or([0.0; 4]), &grid, settings)
    }
}

/// Model bound to one activity signal for a single integration
struct GluSystem<'a> {
    model: &'a GluMetabolism,
    activity: &'a Signal,
}

impl OdeSystem for GluSystem<'_> {
    fn ndim(&self) -> usize {
        4
    }

    fn state_names(&self) -> &'static [&'static str] {
        &GLU_STATE_NAMES
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        let d = self.model.derivative(t, y, self.activity);
        dydt.copy_from_slice(&d);
    }

    fn project(&self, y: &mut [f64]) {
        for v in y.iter_mut() {
            *v = v.max(0.0);
        }
    }
}

// ============================================================================
// High vs low activity comparison
// ============================================================================

/// Outcome of one constant-activity run
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRun {
    pub t7_activity: f64,
    pub final_icd: f64,
    pub final_gdhA: f64,
    pub final_glu_intra_mM: f64,
    pub peak_glu_extra_mM: f64,
}

/// High vs low T7 activity under otherwise identical conditions
#[derive(Debug, Clone, Serialize)]
pub struct ActivityComparison {
    pub high: ActivityRun,
    pub low: ActivityRun,
}

impl ActivityComparison {
    /// Ratio of final gdhA levels, high over low
    pub fn gdhA_fold(&self) -> f64 {
        self.high.final_gdhA / self.low.final_gdhA.max(1e-12)
    }

    pub fn print_summary(&self) {
        println!("=== T7 Activity Comparison ===");
        for (label, run) in [("High", &self.high), ("Low", &self.low)] {
            println!(
                "{:<5} T7 {:>7.1} AU | Icd {:>8.3} | gdhA {:>8.3} | Glu_in {:>9.2} mM | peak Glu_out {:>8.3} mM",
                label,
                run.t7_activity,
                run.final_icd,
                run.final_gdhA,
                run.final_glu_intra_mM,
                run.peak_glu_extra_mM
            );
        }
        let check = if self.high.final_gdhA > self.low.final_gdhA {
            "✓"
        } else {
            "⚠️"
        };
        println!("{} gdhA fold (high/low): {:.1}", check, self.gdhA_fold());
    }
}

fn constant_activity_run(
    model: &GluMetabolism,
    t7: f64,
    t_end_h: f64,
    settings: &SolverSettings,
) -> Result<ActivityRun> {
    let traj = model.simulate(&Signal::constant(t7), t_end_h, 0.1, None, settings)?;
    Ok(ActivityRun {
        t7_activity: t7,
        final_icd: traj.final_value("Icd")?,
        final_gdhA: traj.final_value("gdhA")?,
        final_glu_intra_mM: traj.final_value("Glu_intra_mM")?,
        peak_glu_extra_mM: traj.max_of("Glu_extra_mM")?,
    })
}

/// Run the model at a high and a low constant activity (e.g. 3000 vs 50 AU)
pub fn compare_activity_levels(
    model: &GluMetabolism,
    high: f64,
    low: f64,
    t_end_h: f64,
    settings: &SolverSettings,
) -> Result<ActivityComparison> {
    log::info!(
        "Comparing T7 activity {} vs {} AU over {} h",
        high,
        low,
        t_end_h
    );
    Ok(ActivityComparison {
        high: constant_activity_run(model, high, t_end_h, settings)?,
        low: constant_activity_run(model, low, t_end_h, settings)?,
    })
}
