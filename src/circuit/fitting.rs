//! Calibration of promoter and gate parameters from measurements.
//!
//! Promoter fit: a Hill curve (activating or repressing) is fitted to a
//! replicate-averaged dose-response curve by bounded Levenberg-Marquardt.
//! Gate fit: alpha, Kd and leaky of the split-T7 binding rule are fitted to
//! measured T7 activity against the two arm outputs.
//!
//! Quality metrics follow the usual conventions:
//! - R² = 1 - var(residual) / var(y)
//! - AIC = N * ln(RSS / N) + 2k, with k free parameters

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::gate::GateParameters;
use super::lm;
use super::promoter::{HillParameters, PromoterMode};
use crate::error::{GlufireError, Result};
use crate::numerics::stats;

/// Smallest dose-response curve accepted for a 4-parameter fit
pub const MIN_FIT_POINTS: usize = 4;

/// Requested response direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    Activating,
    Repressing,
    /// Negative input/output correlation selects repressing
    Auto,
}

impl FitMode {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "auto" => FitMode::Auto,
            other => match PromoterMode::from_label(other) {
                PromoterMode::Activating => FitMode::Activating,
                PromoterMode::Repressing => FitMode::Repressing,
            },
        }
    }
}

/// Optimiser controls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Outer Levenberg-Marquardt iterations before giving up
    pub max_iterations: usize,
    /// Relative cost decrease treated as converged
    pub ftol: f64,
    /// Relative step length treated as converged
    pub xtol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            ftol: 1e-9,
            xtol: 1e-9,
        }
    }
}

// ============================================================================
// Dose-response data
// ============================================================================

/// Replicate-averaged dose-response curve, sorted by input level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseResponse {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl DoseResponse {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(GlufireError::invalid(format!(
                "dose-response has {} inputs but {} outputs",
                x.len(),
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite() || *v < 0.0) {
            return Err(GlufireError::invalid(
                "dose-response values must be finite and non-negative",
            ));
        }
        Ok(Self { x, y })
    }

    /// Average replicate rows that share an input level
    pub fn from_replicates(rows: &[(f64, f64)]) -> Result<Self> {
        let mut groups: BTreeMap<u64, (f64, f64, usize)> = BTreeMap::new();
        for &(x, y) in rows {
            if !x.is_finite() || x < 0.0 {
                return Err(GlufireError::invalid(format!("invalid input level {}", x)));
            }
            // Non-negative floats order the same as their bit patterns
            let entry = groups.entry(x.to_bits()).or_insert((x, 0.0, 0));
            entry.1 += y;
            entry.2 += 1;
        }
        let (x, y) = groups
            .values()
            .map(|(x, sum, count)| (*x, sum / *count as f64))
            .unzip();
        Self::new(x, y)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn distinct_levels(&self) -> usize {
        let mut levels: Vec<u64> = self.x.iter().map(|v| v.to_bits()).collect();
        levels.sort_unstable();
        levels.dedup();
        levels.len()
    }
}

/// Read raw replicate rows from a CSV file and average them per input level
///
/// `x_col` and `y_col` name the header columns, e.g. `O2_percent` and
/// `reporter_MEFL`.
pub fn load_dose_response_csv<P: AsRef<Path>>(path: P, x_col: &str, y_col: &str) -> Result<DoseResponse> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| GlufireError::invalid(format!("column '{}' not found in {}", name, path.display())))
    };
    let xi = find(x_col)?;
    let yi = find(y_col)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let parse = |idx: usize| -> Result<f64> {
            let field = record.get(idx).unwrap_or("").trim();
            field.parse::<f64>().map_err(|_| {
                GlufireError::invalid(format!("row {}: cannot parse '{}' as a number", line + 2, field))
            })
        };
        rows.push((parse(xi)?, parse(yi)?));
    }
    log::info!("Loaded {} dose-response rows from {}", rows.len(), path.display());
    DoseResponse::from_replicates(&rows)
}

// ============================================================================
// Promoter fit
// ============================================================================

/// Fitted promoter with quality metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HillFit {
    pub params: HillParameters,
    pub r_squared: f64,
    pub aic: f64,
    pub rss: f64,
    pub iterations: usize,
}

impl HillFit {
    pub fn print_summary(&self, name: &str) {
        let p = &self.params;
        println!(
            "{} ({}) - R²: {:.3}, AIC: {:.1}",
            name,
            p.mode.label(),
            self.r_squared,
            self.aic
        );
        println!(
            "  beta={:.1}, K={:.2}, n={:.2}, leaky={:.1}",
            p.beta, p.K, p.n, p.leaky
        );
    }
}

fn r_squared(residuals: &[f64], y: &[f64]) -> f64 {
    let var_y = stats::variance(y);
    if var_y <= 0.0 {
        return if stats::variance(residuals) <= 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - stats::variance(residuals) / var_y
}

fn aic(rss: f64, n_points: usize, n_params: usize) -> f64 {
    let n = n_points as f64;
    // A perfect fit would give ln(0); floor the mean square instead
    n * (rss / n).max(1e-300).ln() + 2.0 * n_params as f64
}

/// Fit a Hill curve to a dose-response dataset
///
/// Returns `Ok(None)` when the optimiser does not converge; the caller decides
/// whether to fall back to defaults.
///
/// # Errors
/// `InsufficientData` with fewer than 4 distinct input levels.
pub fn fit_promoter(data: &DoseResponse, mode: FitMode, options: &FitOptions) -> Result<Option<HillFit>> {
    let distinct = data.distinct_levels();
    if distinct < MIN_FIT_POINTS {
        return Err(GlufireError::InsufficientData {
            needed: MIN_FIT_POINTS,
            got: distinct,
        });
    }

    let mode = match mode {
        FitMode::Activating => PromoterMode::Activating,
        FitMode::Repressing => PromoterMode::Repressing,
        FitMode::Auto => {
            if stats::pearson(&data.x, &data.y) < 0.0 {
                PromoterMode::Repressing
            } else {
                PromoterMode::Activating
            }
        }
    };

    let y_min = data.y.iter().copied().fold(f64::INFINITY, f64::min);
    let y_max = data.y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // [beta, K, n, leaky]
    let p0 = [y_max - y_min, stats::median(&data.x) + 1e-6, 2.0, y_min];
    let lower = [0.0, 1e-6, 0.1, 0.0];
    let upper = [f64::INFINITY, f64::INFINITY, 10.0, f64::INFINITY];

    let model = |p: &[f64]| HillParameters {
        beta: p[0],
        K: p[1],
        n: p[2],
        leaky: p[3],
        mode,
    };
    let residuals = |p: &[f64]| -> Vec<f64> {
        let hill = model(p);
        data.x
            .iter()
            .zip(&data.y)
            .map(|(&x, &y)| hill.evaluate(x) - y)
            .collect()
    };

    let solution = match lm::minimize(&residuals, &p0, &lower, &upper, options) {
        Some(s) => s,
        None => {
            log::warn!(
                "Promoter fit ({:?}) did not converge within {} iterations",
                mode,
                options.max_iterations
            );
            return Ok(None);
        }
    };

    let resid = residuals(&solution.params);
    let fit = HillFit {
        params: model(&solution.params),
        r_squared: r_squared(&resid, &data.y),
        aic: aic(solution.rss, data.len(), 4),
        rss: solution.rss,
        iterations: solution.iterations,
    };
    log::info!(
        "Promoter fit ({}) converged in {} iterations, R² = {:.4}",
        mode.label(),
        fit.iterations,
        fit.r_squared
    );
    Ok(Some(fit))
}

// ============================================================================
// Gate fit
// ============================================================================

/// Fitted gate parameters with quality metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateFit {
    pub params: GateParameters,
    pub mse: f64,
    pub r_squared: f64,
}

/// Fit alpha, Kd and leaky to measured T7 activity
///
/// `arm_a` and `arm_b` are promoter outputs, `activity` the measured T7 signal.
pub fn fit_gate(
    arm_a: &[f64],
    arm_b: &[f64],
    activity: &[f64],
    options: &FitOptions,
) -> Result<Option<GateFit>> {
    let n = activity.len();
    if arm_a.len() != n || arm_b.len() != n {
        return Err(GlufireError::invalid("gate fit inputs must have equal length"));
    }
    if n < 3 {
        return Err(GlufireError::InsufficientData { needed: 3, got: n });
    }
    let product: Vec<f64> = arm_a.iter().zip(arm_b).map(|(a, b)| a * b).collect();
    if product.iter().chain(activity).any(|v| !v.is_finite()) {
        return Err(GlufireError::invalid("gate fit inputs must be finite"));
    }

    let y_max = activity.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(1e-6);
    let y_min = activity.iter().copied().fold(f64::INFINITY, f64::min).max(0.0);
    let ab_max = product.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(1e-6);

    // [alpha, Kd, leaky]
    let p0 = [y_max, stats::mean(&product).max(1e-6), y_min.min(y_max)];
    let lower = [1e-6, 1e-6, 0.0];
    let upper = [10.0 * y_max, 10.0 * ab_max, y_max];

    let model = |p: &[f64]| GateParameters {
        alpha: p[0],
        Kd: p[1],
        leaky: p[2],
    };
    let residuals = |p: &[f64]| -> Vec<f64> {
        let gate = model(p);
        arm_a
            .iter()
            .zip(arm_b)
            .zip(activity)
            .map(|((&a, &b), &y)| gate.combine(a, b) - y)
            .collect()
    };

    let solution = match lm::minimize(&residuals, &p0, &lower, &upper, options) {
        Some(s) => s,
        None => {
            log::warn!("Gate fit did not converge within {} iterations", options.max_iterations);
            return Ok(None);
        }
    };

    let resid = residuals(&solution.params);
    Ok(Some(GateFit {
        params: model(&solution.params),
        mse: solution.rss / n as f64,
        r_squared: r_squared(&resid, activity),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicates_are_averaged_and_sorted() {
        let rows = [(5.0, 10.0), (1.0, 2.0), (5.0, 14.0), (1.0, 4.0), (0.0, 7.0)];
        let data = DoseResponse::from_replicates(&rows).unwrap();
        assert_eq!(data.x, vec![0.0, 1.0, 5.0]);
        assert_eq!(data.y, vec![7.0, 3.0, 12.0]);
    }

    #[test]
    fn test_too_few_points_rejected() {
        let data = DoseResponse::new(vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]).unwrap();
        let err = fit_promoter(&data, FitMode::Auto, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, GlufireError::InsufficientData { needed: 4, got: 3 }));
    }

    #[test]
    fn test_exact_activating_recovery() {
        let truth = HillParameters::lr_heat();
        let x: Vec<f64> = (0..12).map(|i| 30.0 + i as f64 * 1.5).collect();
        let y: Vec<f64> = x.iter().map(|&v| truth.evaluate(v)).collect();
        let data = DoseResponse::new(x, y).unwrap();
        let fit = fit_promoter(&data, FitMode::Auto, &FitOptions::default())
            .unwrap()
            .expect("fit should converge");
        assert_eq!(fit.params.mode, PromoterMode::Activating);
        assert!((fit.params.K - 40.0).abs() < 0.1, "K = {}", fit.params.K);
        assert!((fit.params.n - 8.0).abs() < 0.2, "n = {}", fit.params.n);
        assert!(fit.r_squared > 0.999);
    }

    #[test]
    fn test_auto_detects_repression() {
        let truth = HillParameters::pept_oxygen();
        let x = vec![0.0, 1.0, 2.0, 5.0, 10.0, 15.0, 21.0];
        let y: Vec<f64> = x.iter().map(|&v| truth.evaluate(v)).collect();
        let data = DoseResponse::new(x, y).unwrap();
        let fit = fit_promoter(&data, FitMode::Auto, &FitOptions::default())
            .unwrap()
            .expect("fit should converge");
        assert_eq!(fit.params.mode, PromoterMode::Repressing);
        assert!((fit.params.K - 5.0).abs() < 0.05, "K = {}", fit.params.K);
    }

    #[test]
    fn test_single_iteration_budget_gives_no_fit() {
        let truth = HillParameters::lr_heat();
        let x: Vec<f64> = (0..10).map(|i| 32.0 + i as f64 * 2.0).collect();
        let y: Vec<f64> = x.iter().map(|&v| truth.evaluate(v)).collect();
        let data = DoseResponse::new(x, y).unwrap();
        let options = FitOptions {
            max_iterations: 1,
            ..FitOptions::default()
        };
        assert!(fit_promoter(&data, FitMode::Activating, &options).unwrap().is_none());
    }

    #[test]
    fn test_gate_fit_recovers_parameters() {
        let truth = GateParameters {
            alpha: 2000.0,
            Kd: 3.0e5,
            leaky: 20.0,
        };
        let arm_a: Vec<f64> = (1..=8).map(|i| 150.0 * i as f64).collect();
        let arm_b: Vec<f64> = (1..=8).map(|i| 120.0 * (9 - i) as f64 + 60.0 * i as f64).collect();
        let activity: Vec<f64> = arm_a.iter().zip(&arm_b).map(|(&a, &b)| truth.combine(a, b)).collect();
        let fit = fit_gate(&arm_a, &arm_b, &activity, &FitOptions::default())
            .unwrap()
            .expect("gate fit should converge");
        assert!(fit.r_squared > 0.999, "R² = {}", fit.r_squared);
        assert!((fit.params.alpha - 2000.0).abs() / 2000.0 < 0.05, "alpha = {}", fit.params.alpha);
    }

    #[test]
    fn test_aic_guard_on_perfect_fit() {
        assert!(aic(0.0, 10, 4).is_finite());
        assert_eq!(r_squared(&[0.0, 0.0], &[3.0, 3.0]), 1.0);
    }

    #[test]
    fn test_fit_mode_labels() {
        assert_eq!(FitMode::from_label("auto"), FitMode::Auto);
        assert_eq!(FitMode::from_label("rep"), FitMode::Repressing);
        assert_eq!(FitMode::from_label("act"), FitMode::Activating);
    }
}
