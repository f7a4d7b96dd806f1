//! Tumour, engineered-cell and glutamate dynamics as one ODE system.
//!
//! State (7): [N_tumor, D_tumor, N_eng, Glu_intra, Glu_extra, Icd, gdhA]
//!
//! dN_tumor/dt = r * N * (1 - (N + N_eng)/K) - k_ferro(Glu_extra) * N
//! dD_tumor/dt = k_ferro(Glu_extra) * N
//! dN_eng/dt   = r_eng * N_eng * (1 - (N + N_eng)/K) * H(T7) - k_dil * N_eng
//!
//! with k_ferro(C) = k_max * C^n / (K_glu^n + C^n). The glutamate block is the
//! minimal model, with the volume ratio N_eng * V_cell / V_ext taken from the
//! current engineered population at each evaluation. T7 activity comes from
//! any [`ActivitySource`], either the instantaneous gate or the
//! reconstitution kinetics.
//!
//! Populations below one cell are treated as extinct: the derivative is
//! zeroed and the value is clamped to 0 after each accepted step.
//!
//! References:
//! - Dixon SJ et al. Cell. 2012;149:1060-1072 (glutamate-induced ferroptosis)
//! - Verhulst PF. Correspondance Math Phys. 1838;10:113-121 (logistic growth)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::circuit::{ActivitySource, AndGate, EnvironmentSchedule};
use crate::error::{GlufireError, Result};
use crate::metabolism::{GluParameters, ProducerPopulation, VolumeCoupling};
use crate::numerics::kinetics::hill_activation;
use crate::numerics::signal::Signal;
use crate::numerics::{integrate, stats, OdeSystem, SolverSettings, Trajectory};

/// Field names of the therapy state vector
pub const THERAPY_STATE_NAMES: [&str; 7] = [
    "N_tumor",
    "D_tumor",
    "N_eng",
    "Glu_intra_mM",
    "Glu_extra_mM",
    "Icd",
    "gdhA",
];

const N_TUMOR: usize = 0;
const D_TUMOR: usize = 1;
const N_ENG: usize = 2;
const GLU_BLOCK: usize = 3;

/// Below this a population is extinct
pub const MIN_VIABLE_CELLS: f64 = 1.0;

/// Population, ferroptosis and glutamate parameters of a therapy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TherapyParameters {
    /// Tumour growth rate (1/h)
    pub r_tumor_per_h: f64,
    /// Shared carrying capacity (cells)
    pub K_capacity: f64,
    /// Maximal ferroptotic death rate (1/h)
    pub k_ferroptosis_max_per_h: f64,
    /// Extracellular glutamate at half-maximal death rate (mM)
    pub K_glu_mM: f64,
    pub n_glu: f64,
    /// Engineered-cell growth rate at full induction (1/h)
    pub r_eng_per_h: f64,
    /// Volume of one engineered cell (L)
    pub V_cell_L: f64,
    /// Tumour interstitial volume (L)
    pub V_ext_L: f64,
    pub initial_tumor_cells: f64,
    pub initial_engineered_cells: f64,
    pub t_end_h: f64,
    pub dt_h: f64,
    pub glu: GluParameters,
}

impl Default for TherapyParameters {
    fn default() -> Self {
        Self {
            r_tumor_per_h: 0.01,
            K_capacity: 1e9,
            k_ferroptosis_max_per_h: 15.0,
            K_glu_mM: 0.5,
            n_glu: 5.0,
            r_eng_per_h: 0.2,
            V_cell_L: 2e-12,
            V_ext_L: 0.01,
            initial_tumor_cells: 1e6,
            initial_engineered_cells: 5e5,
            t_end_h: 200.0,
            dt_h: 0.5,
            glu: Self::default_glu(),
        }
    }
}

impl TherapyParameters {
    /// Glutamate block tuned so the therapy T7 level fully induces the pathway
    pub fn default_glu() -> GluParameters {
        GluParameters {
            K_t7: 800.0,
            k_syn_icd: 3.0,
            k_syn_gdhA: 3.0,
            k_deg_icd: 0.3,
            k_deg_gdhA: 0.3,
            k_dilution: 0.15,
            Vmax_gdhA: 100.0,
            n_hill: 4.0,
            ..GluParameters::default()
        }
    }

    /// Ferroptotic death rate at an extracellular glutamate level
    pub fn ferroptosis_rate(&self, glu_extra_mM: f64) -> f64 {
        self.k_ferroptosis_max_per_h * hill_activation(glu_extra_mM, self.K_glu_mM, self.n_glu)
    }

    pub fn coupling(&self) -> VolumeCoupling {
        VolumeCoupling::Producers {
            cell_volume_L: self.V_cell_L,
            extracellular_volume_L: self.V_ext_L,
        }
    }

    /// [N_tumor, D_tumor, N_eng, 0, 0, 0, 0]
    pub fn initial_state(&self) -> [f64; 7] {
        [
            self.initial_tumor_cells,
            0.0,
            self.initial_engineered_cells,
            0.0,
            0.0,
            0.0,
            0.0,
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.K_capacity > 0.0) || !(self.V_ext_L > 0.0) || !(self.K_glu_mM > 0.0) {
            return Err(GlufireError::invalid(
                "K_capacity, V_ext_L and K_glu_mM must be > 0",
            ));
        }
        if !(self.dt_h > 0.0) || !(self.t_end_h > self.dt_h) {
            return Err(GlufireError::invalid(format!(
                "need 0 < dt ({}) < t_end ({})",
                self.dt_h, self.t_end_h
            )));
        }
        self.glu.validate()
    }
}

fn viable(cells: f64) -> f64 {
    if cells < MIN_VIABLE_CELLS {
        0.0
    } else {
        cells
    }
}

/// Joint tumour / engineered-cell / glutamate model
#[derive(Debug, Clone)]
pub struct TherapyModel {
    pub params: TherapyParameters,
    pub gate: Arc<dyn ActivitySource>,
}

impl Default for TherapyModel {
    fn default() -> Self {
        Self::new(TherapyParameters::default(), AndGate::default())
    }
}

impl ProducerPopulation for TherapyModel {
    fn producer_count(&self, y: &[f64]) -> f64 {
        viable(y[N_ENG])
    }
}

impl TherapyModel {
    pub fn new<G: ActivitySource + 'static>(params: TherapyParameters, gate: G) -> Self {
        Self {
            params,
            gate: Arc::new(gate),
        }
    }

    /// T7 activity over the run horizon for an environment schedule
    pub fn activity_signal(&self, env: &EnvironmentSchedule) -> Result<Signal> {
        self.gate.activity_signal(env, self.params.t_end_h)
    }

    /// d(state)/dt at time t under a resolved T7 signal
    pub fn derivative(&self, t: f64, y: &[f64], t7: &Signal) -> [f64; 7] {
        let p = &self.params;
        let n_tumor = viable(y[N_TUMOR]);
        let n_eng = viable(y[N_ENG]);
        let glu_extra = y[GLU_BLOCK + 1].max(0.0);
        let t7_now = t7.value_at(t);

        let mut d = [0.0; 7];
        let ratio = p.coupling().ratio(self.producer_count(y));
        p.glu
            .derivatives(t7_now, &y[GLU_BLOCK..], ratio, &mut d[GLU_BLOCK..]);

        let crowding = 1.0 - (n_tumor + n_eng) / p.K_capacity;
        let death = p.ferroptosis_rate(glu_extra) * n_tumor;
        d[N_TUMOR] = p.r_tumor_per_h * n_tumor * crowding - death;
        d[D_TUMOR] = death;
        d[N_ENG] = p.r_eng_per_h * n_eng * crowding * p.glu.induction(t7_now)
            - p.glu.k_dilution * n_eng;

        if n_tumor == 0.0 {
            d[N_TUMOR] = 0.0;
        }
        if n_eng == 0.0 {
            d[N_ENG] = 0.0;
        }
        d
    }

    /// Integrate from the configured initial state under a given T7 signal
    pub fn simulate_with_signal(&self, t7: &Signal, settings: &SolverSettings) -> Result<Trajectory> {
        self.params.validate()?;
        let grid = stats::arange(0.0, self.params.t_end_h, self.params.dt_h);
        let system = TherapySystem { model: self, t7 };
        integrate(&system, &self.params.initial_state(), &grid, settings)
    }

    /// Integrate under an environment schedule
    pub fn simulate(&self, env: &EnvironmentSchedule, settings: &SolverSettings) -> Result<Trajectory> {
        let t7 = self.activity_signal(env)?;
        self.simulate_with_signal(&t7, settings)
    }
}

struct TherapySystem<'a> {
    model: &'a TherapyModel,
    t7: &'a Signal,
}

impl OdeSystem for TherapySystem<'_> {
    fn ndim(&self) -> usize {
        7
    }

    fn state_names(&self) -> &'static [&'static str] {
        &THERAPY_STATE_NAMES
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt.copy_from_slice(&self.model.derivative(t, y, self.t7));
    }

    fn project(&self, y: &mut [f64]) {
        y[N_TUMOR] = viable(y[N_TUMOR]);
        y[N_ENG] = viable(y[N_ENG]);
        for v in y.iter_mut() {
            *v = v.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_cell_population_is_frozen() {
        let model = TherapyModel::default();
        let y = [0.5, 10.0, 0.9, 1.0, 5.0, 1.0, 1.0];
        let d = model.derivative(0.0, &y, &Signal::constant(2000.0));
        assert_eq!(d[N_TUMOR], 0.0);
        assert_eq!(d[N_ENG], 0.0);
        assert_eq!(d[D_TUMOR], 0.0);
    }

    #[test]
    fn test_producer_count_feeds_extracellular_flux() {
        let model = TherapyModel::default();
        let t7 = Signal::constant(0.0);
        let few = [1e6, 0.0, 1e5, 20.0, 0.0, 0.0, 0.0];
        let many = [1e6, 0.0, 2e5, 20.0, 0.0, 0.0, 0.0];
        let d_few = model.derivative(0.0, &few, &t7);
        let d_many = model.derivative(0.0, &many, &t7);
        assert!(d_few[4] > 0.0);
        assert!((d_many[4] - 2.0 * d_few[4]).abs() < 1e-12);
    }

    #[test]
    fn test_ferroptosis_switch() {
        let p = TherapyParameters::default();
        assert_eq!(p.ferroptosis_rate(0.0), 0.0);
        assert!((p.ferroptosis_rate(0.5) - 7.5).abs() < 1e-9);
        assert!(p.ferroptosis_rate(5.0) > 14.9);
        assert!(p.ferroptosis_rate(0.1) < 0.01);
    }

    #[test]
    fn test_projection_clears_sub_cell_counts() {
        let model = TherapyModel::default();
        let t7 = Signal::constant(0.0);
        let system = TherapySystem { model: &model, t7: &t7 };
        let mut y = [0.7, 3.0, 0.2, -1e-9, 0.0, 0.0, 0.0];
        system.project(&mut y);
        assert_eq!(y[N_TUMOR], 0.0);
        assert_eq!(y[N_ENG], 0.0);
        assert_eq!(y[GLU_BLOCK], 0.0);
        assert_eq!(y[D_TUMOR], 3.0);
    }

    #[test]
    fn test_initial_state_layout() {
        let p = TherapyParameters::default();
        assert_eq!(p.initial_state(), [1e6, 0.0, 5e5, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(stats::arange(0.0, p.t_end_h, p.dt_h).len(), 400);
    }
}
