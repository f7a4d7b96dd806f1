//! Adaptive step-size solvers.
//!
//! - [`DormandPrince`]: explicit 5(4) pair with FSAL and a PI-style step
//!   controller. Used for the linear PK compartments.
//! - [`Sdirk`]: L-stable two-stage SDIRK (gamma = 1 - 1/sqrt(2)) with an
//!   embedded first-order error estimate and simplified Newton iteration on
//!   (I - h*gamma*J). Used for the stiff strain metabolism model.
//!
//! Both steppers keep their step size between calls to `advance`, so a run over
//! a fine output grid does not restart the controller at every grid point.
//! Steps are shortened to land exactly on the target time.
//!
//! References:
//! - Dormand JR, Prince PJ. J Comput Appl Math. 1980;6:19-26
//! - Alexander R. SIAM J Numer Anal. 1977;14:1006-1021

use nalgebra::{DMatrix, DVector};

use super::{OdeSystem, SolverSettings};
use crate::error::{GlufireError, Result};

/// Shared step allowance for one integration, rejected steps included
#[derive(Debug, Clone)]
pub struct StepBudget {
    total: usize,
    remaining: usize,
}

impl StepBudget {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            remaining: total,
        }
    }

    /// Consume one step, failing once the allowance is spent
    pub fn take(&mut self, t: f64) -> Result<()> {
        if self.remaining == 0 {
            return Err(GlufireError::integration(
                t,
                format!("step budget of {} exhausted", self.total),
            ));
        }
        self.remaining -= 1;
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.total - self.remaining
    }
}

/// True when `t` is close enough to `target` to snap onto it
fn reached(t: f64, target: f64) -> bool {
    target - t <= 1e-12 * target.abs().max(1.0)
}

/// Weighted RMS norm of an error vector
fn error_norm(err: &[f64], y_old: &[f64], y_new: &[f64], settings: &SolverSettings) -> f64 {
    let n = err.len();
    let mut acc = 0.0;
    for i in 0..n {
        let sc = settings.atol + settings.rtol * y_old[i].abs().max(y_new[i].abs());
        acc += (err[i] / sc) * (err[i] / sc);
    }
    (acc / n as f64).sqrt()
}

// ============================================================================
// Dormand-Prince 5(4)
// ============================================================================

// Stage coefficients
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (advancing solution)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// 4th-order embedded weights
const BS1: f64 = 5179.0 / 57600.0;
const BS3: f64 = 7571.0 / 16695.0;
const BS4: f64 = 393.0 / 640.0;
const BS5: f64 = -92097.0 / 339200.0;
const BS6: f64 = 187.0 / 2100.0;
const BS7: f64 = 1.0 / 40.0;

const E1: f64 = B1 - BS1;
const E3: f64 = B3 - BS3;
const E4: f64 = B4 - BS4;
const E5: f64 = B5 - BS5;
const E6: f64 = B6 - BS6;
const E7: f64 = -BS7;

/// Explicit Dormand-Prince stepper
pub struct DormandPrince {
    h: f64,
    k: [Vec<f64>; 7],
    y_tmp: Vec<f64>,
    y_new: Vec<f64>,
    err: Vec<f64>,
    /// k[0] holds f(t, y) for the current (t, y)
    fsal: bool,
    warned_floor: bool,
}

impl DormandPrince {
    pub fn new(n: usize, h0: f64) -> Self {
        Self {
            h: h0,
            k: std::array::from_fn(|_| vec![0.0; n]),
            y_tmp: vec![0.0; n],
            y_new: vec![0.0; n],
            err: vec![0.0; n],
            fsal: false,
            warned_floor: false,
        }
    }

    /// Advance (t, y) to exactly `t_end`
    pub fn advance<S: OdeSystem + ?Sized>(
        &mut self,
        sys: &S,
        t: &mut f64,
        y: &mut [f64],
        t_end: f64,
        settings: &SolverSettings,
        budget: &mut StepBudget,
    ) -> Result<()> {
        let n = y.len();
        if !self.fsal {
            sys.rhs(*t, y, &mut self.k[0]);
            self.fsal = true;
        }

        while !reached(*t, t_end) {
            budget.take(*t)?;
            let remaining = t_end - *t;
            let h_nominal = self.h.clamp(settings.h_min, settings.h_max);
            let h = h_nominal.min(remaining);
            let at_floor = h <= settings.h_min && h < remaining;

            let [k1, k2, k3, k4, k5, k6, k7] = &mut self.k;
            let y_tmp = &mut self.y_tmp;

            for i in 0..n {
                y_tmp[i] = y[i] + h * A21 * k1[i];
            }
            sys.rhs(*t + h / 5.0, y_tmp, k2);

            for i in 0..n {
                y_tmp[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
            }
            sys.rhs(*t + 3.0 * h / 10.0, y_tmp, k3);

            for i in 0..n {
                y_tmp[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
            }
            sys.rhs(*t + 4.0 * h / 5.0, y_tmp, k4);

            for i in 0..n {
                y_tmp[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
            }
            sys.rhs(*t + 8.0 * h / 9.0, y_tmp, k5);

            for i in 0..n {
                y_tmp[i] = y[i]
                    + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
            }
            sys.rhs(*t + h, y_tmp, k6);

            for i in 0..n {
                self.y_new[i] =
                    y[i] + h * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
            }
            sys.rhs(*t + h, &self.y_new, k7);

            for i in 0..n {
                self.err[i] = h
                    * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            }
            let err_norm = error_norm(&self.err, y, &self.y_new, settings);
            if !err_norm.is_finite() {
                return Err(GlufireError::integration(*t, "non-finite error estimate"));
            }

            let accept = err_norm <= 1.0 || at_floor;
            if accept {
                if err_norm > 1.0 && !self.warned_floor {
                    log::warn!(
                        "Dormand-Prince step forced at the floor h = {:.3e} h (t = {:.4})",
                        h,
                        *t
                    );
                    self.warned_floor = true;
                }
                *t = if h >= remaining { t_end } else { *t + h };
                y.copy_from_slice(&self.y_new);
                sys.project(y);
                if y.iter().any(|v| !v.is_finite()) {
                    return Err(GlufireError::integration(*t, "state became non-finite"));
                }
                if y[..] == self.y_new[..] {
                    k1.copy_from_slice(k7);
                } else {
                    sys.rhs(*t, y, k1);
                }
            }

            let factor = if err_norm == 0.0 {
                5.0
            } else {
                (0.9 * err_norm.powf(-0.2)).clamp(0.2, 5.0)
            };
            self.h = (h * factor).clamp(settings.h_min, settings.h_max);
            // A step shortened to hit the grid says nothing about the local scale
            if accept && h < h_nominal {
                self.h = self.h.max(h_nominal);
            }
        }
        *t = t_end;
        Ok(())
    }
}

// ============================================================================
// SDIRK2 (L-stable)
// ============================================================================

const MAX_NEWTON: usize = 10;
const NEWTON_TOL: f64 = 0.01;

/// Implicit SDIRK stepper for stiff systems
///
/// Butcher tableau:
/// ```text
///   g | g      0
///   1 | 1-g    g
///  ---+----------
///     | 1-g    g     (2nd order)
///     | 1      0     (1st order, error estimate)
/// ```
pub struct Sdirk {
    h: f64,
    gamma: f64,
    k1: Vec<f64>,
    k2: Vec<f64>,
    stage_y: Vec<f64>,
    residual: Vec<f64>,
    y_new: Vec<f64>,
    err: Vec<f64>,
    jac: DMatrix<f64>,
    lu: Option<nalgebra::linalg::LU<f64, nalgebra::Dyn, nalgebra::Dyn>>,
    cached_hgamma: f64,
    warned_floor: bool,
}

enum Newton {
    Converged,
    Failed,
}

impl Sdirk {
    pub fn new(n: usize, h0: f64) -> Self {
        Self {
            h: h0,
            gamma: 1.0 - std::f64::consts::FRAC_1_SQRT_2,
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            stage_y: vec![0.0; n],
            residual: vec![0.0; n],
            y_new: vec![0.0; n],
            err: vec![0.0; n],
            jac: DMatrix::zeros(n, n),
            lu: None,
            cached_hgamma: -1.0,
            warned_floor: false,
        }
    }

    /// Rebuild the LU factors of (I - h*gamma*J) at (t, y)
    fn refactor<S: OdeSystem + ?Sized>(&mut self, sys: &S, t: f64, y: &[f64], hg: f64) {
        let n = y.len();
        sys.jacobian(t, y, &mut self.jac);
        let iteration = DMatrix::identity(n, n) - &self.jac * hg;
        self.lu = Some(iteration.lu());
        self.cached_hgamma = hg;
    }

    /// Newton iteration for one stage: k = f(t_stage, base + hg*k)
    fn solve_stage<S: OdeSystem + ?Sized>(
        &mut self,
        sys: &S,
        t_stage: f64,
        base: &[f64],
        y_ref: &[f64],
        hg: f64,
        second: bool,
        settings: &SolverSettings,
        t: f64,
    ) -> Result<Newton> {
        let n = base.len();
        let lu = self
            .lu
            .as_ref()
            .ok_or_else(|| GlufireError::integration(t, "iteration matrix not factored"))?;
        let k = if second { &mut self.k2 } else { &mut self.k1 };
        for _ in 0..MAX_NEWTON {
            for i in 0..n {
                self.stage_y[i] = base[i] + hg * k[i];
            }
            sys.rhs(t_stage, &self.stage_y, &mut self.residual);
            for i in 0..n {
                self.residual[i] -= k[i];
            }
            let rhs = DVector::from_column_slice(&self.residual);
            let delta = match lu.solve(&rhs) {
                Some(d) => d,
                None => {
                    return Err(GlufireError::integration(
                        t,
                        "singular Newton iteration matrix",
                    ))
                }
            };
            let mut cnorm = 0.0;
            for i in 0..n {
                k[i] += delta[i];
                let sc = settings.atol + settings.rtol * y_ref[i].abs();
                cnorm += (delta[i] / sc) * (delta[i] / sc);
            }
            cnorm = (cnorm / n as f64).sqrt();
            if !cnorm.is_finite() {
                return Ok(Newton::Failed);
            }
            if cnorm < NEWTON_TOL {
                return Ok(Newton::Converged);
            }
        }
        Ok(Newton::Failed)
    }

    /// Advance (t, y) to exactly `t_end`
    pub fn advance<S: OdeSystem + ?Sized>(
        &mut self,
        sys: &S,
        t: &mut f64,
        y: &mut [f64],
        t_end: f64,
        settings: &SolverSettings,
        budget: &mut StepBudget,
    ) -> Result<()> {
        let n = y.len();
        let gamma = self.gamma;
        let mut base = vec![0.0; n];

        while !reached(*t, t_end) {
            budget.take(*t)?;
            let remaining = t_end - *t;
            let h_nominal = self.h.clamp(settings.h_min, settings.h_max);
            let h = h_nominal.min(remaining);
            let at_floor = h <= settings.h_min && h < remaining;
            let hg = h * gamma;

            if self.cached_hgamma <= 0.0 || (hg - self.cached_hgamma).abs() > 0.2 * self.cached_hgamma
            {
                self.refactor(sys, *t, y, hg);
            }

            // Stage 1, initial guess f(t, y)
            sys.rhs(*t, y, &mut self.k1);
            let stage1 = self.solve_stage(sys, *t + hg, y, y, hg, false, settings, *t)?;
            if let Newton::Failed = stage1 {
                if at_floor {
                    return Err(GlufireError::integration(
                        *t,
                        "Newton iteration failed at the minimum step",
                    ));
                }
                self.h = h * 0.5;
                self.cached_hgamma = -1.0;
                continue;
            }

            // Stage 2, base y + h(1-g)k1, initial guess k1
            for i in 0..n {
                base[i] = y[i] + h * (1.0 - gamma) * self.k1[i];
            }
            self.k2.copy_from_slice(&self.k1);
            let stage2 = self.solve_stage(sys, *t + h, &base, y, hg, true, settings, *t)?;
            if let Newton::Failed = stage2 {
                if at_floor {
                    return Err(GlufireError::integration(
                        *t,
                        "Newton iteration failed at the minimum step",
                    ));
                }
                self.h = h * 0.5;
                self.cached_hgamma = -1.0;
                continue;
            }

            for i in 0..n {
                self.y_new[i] = y[i] + h * ((1.0 - gamma) * self.k1[i] + gamma * self.k2[i]);
                self.err[i] = h * gamma * (self.k2[i] - self.k1[i]);
            }
            let err_norm = error_norm(&self.err, y, &self.y_new, settings);
            if !err_norm.is_finite() {
                return Err(GlufireError::integration(*t, "non-finite error estimate"));
            }

            let accept = err_norm <= 1.0 || at_floor;
            if accept {
                if err_norm > 1.0 && !self.warned_floor {
                    log::warn!(
                        "SDIRK step forced at the floor h = {:.3e} h (t = {:.4})",
                        h,
                        *t
                    );
                    self.warned_floor = true;
                }
                *t = if h >= remaining { t_end } else { *t + h };
                y.copy_from_slice(&self.y_new);
                sys.project(y);
                if y.iter().any(|v| !v.is_finite()) {
                    return Err(GlufireError::integration(*t, "state became non-finite"));
                }
            } else {
                self.cached_hgamma = -1.0;
            }

            let factor = if err_norm == 0.0 {
                4.0
            } else {
                (0.9 * err_norm.powf(-1.0 / 3.0)).clamp(0.25, 4.0)
            };
            self.h = (h * factor).clamp(settings.h_min, settings.h_max);
            if accept && h < h_nominal {
                self.h = self.h.max(h_nominal);
            }
        }
        *t = t_end;
        Ok(())
    }
}
