//! Bound-constrained Levenberg-Marquardt least squares.
//!
//! Minimises sum(r_i(p)^2) with box bounds on p. Each trial step solves
//! (JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr with nalgebra, then projects p + δ back into
//! the box. The Jacobian is a forward difference that steps inward at an
//! upper bound.
//!
//! Reference: Marquardt DW. J Soc Ind Appl Math. 1963;11:431-441

use nalgebra::{DMatrix, DVector};

use super::fitting::FitOptions;

/// Converged optimiser state
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// Residual sum of squares at `params`
    pub rss: f64,
    pub iterations: usize,
}

fn project(p: &mut [f64], lower: &[f64], upper: &[f64]) {
    for i in 0..p.len() {
        p[i] = p[i].clamp(lower[i], upper[i]);
    }
}

fn sum_of_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn jacobian<F>(residuals: &F, p: &[f64], r0: &[f64], upper: &[f64]) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = r0.len();
    let k = p.len();
    let mut jac = DMatrix::zeros(m, k);
    let mut shifted = p.to_vec();
    for j in 0..k {
        let mut h = 1.5e-8 * p[j].abs().max(1.0);
        if p[j] + h > upper[j] {
            h = -h;
        }
        shifted[j] = p[j] + h;
        let r = residuals(&shifted);
        shifted[j] = p[j];
        for i in 0..m {
            jac[(i, j)] = (r[i] - r0[i]) / h;
        }
    }
    jac
}

/// Minimise the residual vector returned by `residuals` inside [lower, upper]
///
/// Returns `None` when the iteration budget runs out before convergence or
/// when the cost becomes non-finite.
pub fn minimize<F>(
    residuals: F,
    p0: &[f64],
    lower: &[f64],
    upper: &[f64],
    options: &FitOptions,
) -> Option<LmSolution>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let k = p0.len();
    let mut p = p0.to_vec();
    project(&mut p, lower, upper);
    let mut r = residuals(&p);
    let mut cost = sum_of_squares(&r);
    if !cost.is_finite() {
        return None;
    }
    let mut lambda = 1e-3;

    for iteration in 1..=options.max_iterations {
        if cost == 0.0 {
            return Some(LmSolution {
                params: p,
                rss: 0.0,
                iterations: iteration - 1,
            });
        }

        let jac = jacobian(&residuals, &p, &r, upper);
        let jt = jac.transpose();
        let normal = &jt * &jac;
        let gradient = &jt * DVector::from_column_slice(&r);

        let mut improved = false;
        while lambda < 1e12 {
            let mut damped = normal.clone();
            for i in 0..k {
                damped[(i, i)] += lambda * normal[(i, i)].max(1e-12);
            }
            let step = match damped.lu().solve(&(-&gradient)) {
                Some(s) => s,
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };

            let mut trial: Vec<f64> = p.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
            project(&mut trial, lower, upper);
            let r_trial = residuals(&trial);
            let cost_trial = sum_of_squares(&r_trial);
            if !cost_trial.is_finite() {
                lambda *= 10.0;
                continue;
            }

            if cost_trial < cost {
                let step_norm: f64 = trial
                    .iter()
                    .zip(&p)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                let p_norm: f64 = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                let relative_drop = (cost - cost_trial) / cost;

                p = trial;
                r = r_trial;
                cost = cost_trial;
                lambda = (lambda / 10.0).max(1e-12);
                improved = true;

                if relative_drop < options.ftol || step_norm < options.xtol * (p_norm + options.xtol)
                {
                    return Some(LmSolution {
                        params: p,
                        rss: cost,
                        iterations: iteration,
                    });
                }
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            // No descent direction left inside the box: stationary point
            return Some(LmSolution {
                params: p,
                rss: cost,
                iterations: iteration,
            });
        }
    }

    None
}
