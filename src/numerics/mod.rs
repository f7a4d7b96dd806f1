//! Numerical core: ODE systems, solvers, input signals and array helpers.
//!
//! Every model in the crate implements [`OdeSystem`] and is run through
//! [`integrate`], which samples the solution exactly on the caller's time grid.
//! Three solvers are available:
//! - Fixed-step RK4 with per-step change limiting
//! - Dormand-Prince 5(4), adaptive, for non-stiff systems (PK)
//! - L-stable SDIRK2, adaptive and implicit, for stiff systems (strain metabolism)
//!
//! References:
//! - Press WH et al. Numerical Recipes. 3rd ed. Cambridge University Press, 2007
//! - Hairer E, Wanner G. Solving Ordinary Differential Equations II. Springer, 1996

pub mod adaptive;
pub mod integrator;
pub mod kinetics;
pub mod signal;
pub mod stats;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{GlufireError, Result};

pub use adaptive::{DormandPrince, Sdirk, StepBudget};
pub use integrator::{IntegratorConfig, RK4Integrator};
pub use kinetics::{hill_activation, hill_repression, michaelis_menten, DENOMINATOR_EPS};
pub use signal::{Interpolation, Signal};

// ============================================================================
// ODE system trait
// ============================================================================

/// Right-hand side of an ODE system dy/dt = f(t, y)
pub trait OdeSystem {
    /// Number of state variables
    fn ndim(&self) -> usize;

    /// Field names of the state vector, in order
    fn state_names(&self) -> &'static [&'static str];

    /// Evaluate f(t, y) into `dydt`
    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]);

    /// Jacobian df/dy by central finite differences
    fn jacobian(&self, t: f64, y: &[f64], jac: &mut DMatrix<f64>) {
        let n = self.ndim();
        let eps = 1e-8;
        let mut yp = y.to_vec();
        let mut fp = vec![0.0; n];
        let mut fm = vec![0.0; n];
        if jac.nrows() != n || jac.ncols() != n {
            *jac = DMatrix::zeros(n, n);
        }
        for j in 0..n {
            let orig = yp[j];
            let h = eps * (1.0 + orig.abs());
            yp[j] = orig + h;
            self.rhs(t, &yp, &mut fp);
            yp[j] = orig - h;
            self.rhs(t, &yp, &mut fm);
            yp[j] = orig;
            for i in 0..n {
                jac[(i, j)] = (fp[i] - fm[i]) / (2.0 * h);
            }
        }
    }

    /// Map a state back onto its admissible set after every accepted step
    ///
    /// The default leaves the state untouched. Models with concentrations or
    /// cell counts clamp them at zero here.
    fn project(&self, _y: &mut [f64]) {}
}

// ============================================================================
// Solver settings
// ============================================================================

/// Integration method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SolverKind {
    /// Classical RK4 with a fixed step (hours)
    FixedStep { dt_h: f64 },
    /// Explicit Dormand-Prince 5(4) with PI step control
    DormandPrince,
    /// Implicit L-stable SDIRK2 with simplified Newton iteration
    Sdirk,
}

/// Solver configuration shared by every simulation entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub kind: SolverKind,
    /// Relative tolerance (adaptive solvers)
    pub rtol: f64,
    /// Absolute tolerance (adaptive solvers)
    pub atol: f64,
    /// Initial step in hours, 0 for automatic
    pub h0: f64,
    /// Step floor in hours
    pub h_min: f64,
    /// Step ceiling in hours
    pub h_max: f64,
    /// Total step budget for one integration, rejected steps included
    pub max_steps: usize,
    /// Largest change of any state variable in one fixed step
    pub max_change_per_step: f64,
    /// Lower bound applied to every state variable by the fixed-step solver
    pub state_floor: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            kind: SolverKind::DormandPrince,
            rtol: 1e-6,
            atol: 1e-9,
            h0: 0.0,
            h_min: 1e-12,
            h_max: 1.0,
            max_steps: 500_000,
            max_change_per_step: 1e12,
            state_floor: None,
        }
    }
}

impl SolverSettings {
    /// Dormand-Prince with the given tolerances
    pub fn dormand_prince(rtol: f64, atol: f64) -> Self {
        Self {
            kind: SolverKind::DormandPrince,
            rtol,
            atol,
            ..Self::default()
        }
    }

    /// SDIRK with the given tolerances
    pub fn sdirk(rtol: f64, atol: f64) -> Self {
        Self {
            kind: SolverKind::Sdirk,
            rtol,
            atol,
            ..Self::default()
        }
    }

    /// Fixed-step RK4
    pub fn fixed_step(dt_h: f64) -> Self {
        Self {
            kind: SolverKind::FixedStep { dt_h },
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(GlufireError::invalid("rtol must be finite and > 0"));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(GlufireError::invalid("atol must be finite and > 0"));
        }
        if !(self.h_min > 0.0 && self.h_max >= self.h_min) {
            return Err(GlufireError::invalid("step bounds must satisfy 0 < h_min <= h_max"));
        }
        if self.max_steps == 0 {
            return Err(GlufireError::invalid("max_steps must be > 0"));
        }
        if let SolverKind::FixedStep { dt_h } = self.kind {
            if !(dt_h.is_finite() && dt_h > 0.0) {
                return Err(GlufireError::invalid("fixed step dt_h must be finite and > 0"));
            }
        }
        Ok(())
    }

    pub(crate) fn initial_step(&self, span: f64) -> f64 {
        if self.h0 > 0.0 {
            self.h0.min(self.h_max)
        } else {
            (span * 1e-3).max(self.h_min).min(self.h_max)
        }
    }
}

// ============================================================================
// Trajectory
// ============================================================================

/// Solution sampled on a time grid, with named state fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    /// State field names, one per column
    pub names: Vec<String>,
    /// Sample times in hours
    pub t: Vec<f64>,
    /// One state vector per sample time
    pub states: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            t: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn push(&mut self, t: f64, state: &[f64]) {
        self.t.push(t);
        self.states.push(state.to_vec());
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Column index of a named field
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| GlufireError::invalid(format!("trajectory has no field '{}'", name)))
    }

    /// Time series of one named field
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.require(name)?;
        Ok(self.states.iter().map(|row| row[idx]).collect())
    }

    /// Final state vector
    pub fn last(&self) -> Option<&[f64]> {
        self.states.last().map(|row| row.as_slice())
    }

    /// Final value of one named field
    pub fn final_value(&self, name: &str) -> Result<f64> {
        let idx = self.require(name)?;
        self.states
            .last()
            .map(|row| row[idx])
            .ok_or_else(|| GlufireError::invalid("trajectory is empty"))
    }

    /// Maximum of one named field over the whole trajectory
    pub fn max_of(&self, name: &str) -> Result<f64> {
        let idx = self.require(name)?;
        if self.states.is_empty() {
            return Err(GlufireError::invalid("trajectory is empty"));
        }
        Ok(self
            .states
            .iter()
            .map(|row| row[idx])
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// Time at which a named field reaches its maximum (first occurrence)
    pub fn time_of_max(&self, name: &str) -> Result<f64> {
        let column = self.column(name)?;
        let mut best = 0;
        for (i, v) in column.iter().enumerate() {
            if *v > column[best] {
                best = i;
            }
        }
        self.t
            .get(best)
            .copied()
            .ok_or_else(|| GlufireError::invalid("trajectory is empty"))
    }
}

// ============================================================================
// Integration driver
// ============================================================================

fn validate_grid(grid: &[f64]) -> Result<()> {
    if grid.is_empty() {
        return Err(GlufireError::invalid("time grid is empty"));
    }
    if grid.iter().any(|t| !t.is_finite()) {
        return Err(GlufireError::invalid("time grid contains non-finite values"));
    }
    if grid.windows(2).any(|w| w[1] <= w[0]) {
        return Err(GlufireError::invalid("time grid must be strictly increasing"));
    }
    Ok(())
}

fn check_finite(t: f64, y: &[f64]) -> Result<()> {
    if y.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(GlufireError::integration(t, "state became non-finite"))
    }
}

/// Integrate `sys` from `y0` and report the state at every grid time
///
/// The first grid point is the initial time. The initial state is projected
/// before integration starts and after every accepted step. Any failure
/// aborts the whole call; a partial trajectory is never returned.
pub fn integrate<S: OdeSystem + ?Sized>(
    sys: &S,
    y0: &[f64],
    grid: &[f64],
    settings: &SolverSettings,
) -> Result<Trajectory> {
    settings.validate()?;
    validate_grid(grid)?;
    let n = sys.ndim();
    if y0.len() != n {
        return Err(GlufireError::invalid(format!(
            "initial state has {} entries but the system has {}",
            y0.len(),
            n
        )));
    }
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(GlufireError::invalid("initial state contains non-finite values"));
    }

    let mut y = y0.to_vec();
    sys.project(&mut y);

    let mut trajectory = Trajectory::new(sys.state_names());
    trajectory.t.reserve(grid.len());
    trajectory.states.reserve(grid.len());
    trajectory.push(grid[0], &y);

    let span = grid[grid.len() - 1] - grid[0];
    let mut budget = StepBudget::new(settings.max_steps);
    let mut t = grid[0];

    match settings.kind {
        SolverKind::FixedStep { dt_h } => {
            let mut rk4 = RK4Integrator::new(
                n,
                IntegratorConfig {
                    dt_h,
                    max_change_per_step: settings.max_change_per_step,
                    min_value: settings.state_floor,
                },
            );
            rk4.time_h = t;
            for &t_next in &grid[1..] {
                let interval = t_next - t;
                let n_steps = (interval / dt_h).ceil().max(1.0) as usize;
                let h = interval / n_steps as f64;
                for _ in 0..n_steps {
                    budget.take(t)?;
                    rk4.step_with(sys, &mut y, h);
                    sys.project(&mut y);
                    check_finite(rk4.time_h, &y)?;
                }
                t = t_next;
                rk4.time_h = t;
                trajectory.push(t, &y);
            }
        }
        SolverKind::DormandPrince => {
            let mut stepper = DormandPrince::new(n, settings.initial_step(span));
            for &t_next in &grid[1..] {
                stepper.advance(sys, &mut t, &mut y, t_next, settings, &mut budget)?;
                trajectory.push(t_next, &y);
            }
        }
        SolverKind::Sdirk => {
            let mut stepper = Sdirk::new(n, settings.initial_step(span));
            for &t_next in &grid[1..] {
                stepper.advance(sys, &mut t, &mut y, t_next, settings, &mut budget)?;
                trajectory.push(t_next, &y);
            }
        }
    }

    log::debug!(
        "integrated {} states over [{}, {}] h in {} steps",
        n,
        grid[0],
        grid[grid.len() - 1],
        budget.used()
    );
    Ok(trajectory)
}
