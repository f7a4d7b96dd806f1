//! Small array utilities: summary statistics, quadrature, numerical
//! differentiation and Savitzky-Golay smoothing.
//!
//! Conventions: `variance` is the population variance (divisor N), `gradient`
//! is second-order accurate in the interior and at both edges, and `arange`
//! excludes its end point.

use nalgebra::DMatrix;

use crate::error::{GlufireError, Result};

/// Arithmetic mean (NaN for an empty slice)
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median (NaN for an empty slice)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Population variance, divisor N
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Pearson correlation coefficient
///
/// Returns 0 when either series has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    sxy / (sxx * syy).sqrt()
}

/// Trapezoidal integral of `y` over the abscissa `x`
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yw, xw)| 0.5 * (yw[0] + yw[1]) * (xw[1] - xw[0]))
        .sum()
}

/// `n` evenly spaced points from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Points `start, start+step, ...` strictly below `end`
pub fn arange(start: f64, end: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || end <= start {
        return Vec::new();
    }
    let n = ((end - start) / step - 1e-9).ceil().max(0.0) as usize;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Derivative dy/dx on a possibly non-uniform grid
///
/// Interior points use the second-order central formula for unequal spacing;
/// the two edges use second-order one-sided three-point formulas.
/// Two-point input falls back to a single forward difference.
pub fn gradient(y: &[f64], x: &[f64]) -> Result<Vec<f64>> {
    let n = y.len();
    if n != x.len() {
        return Err(GlufireError::invalid(format!(
            "gradient: y has {} points but x has {}",
            n,
            x.len()
        )));
    }
    if n < 2 {
        return Err(GlufireError::invalid("gradient needs at least 2 points"));
    }
    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(GlufireError::invalid("gradient: x must be strictly increasing"));
    }
    if n == 2 {
        let slope = (y[1] - y[0]) / (x[1] - x[0]);
        return Ok(vec![slope, slope]);
    }

    let mut out = vec![0.0; n];
    for i in 1..n - 1 {
        let hs = x[i] - x[i - 1];
        let hd = x[i + 1] - x[i];
        out[i] = (hs * hs * y[i + 1] + (hd * hd - hs * hs) * y[i] - hd * hd * y[i - 1])
            / (hs * hd * (hd + hs));
    }

    // Left edge
    let dx1 = x[1] - x[0];
    let dx2 = x[2] - x[1];
    let a = -(2.0 * dx1 + dx2) / (dx1 * (dx1 + dx2));
    let b = (dx1 + dx2) / (dx1 * dx2);
    let c = -dx1 / (dx2 * (dx1 + dx2));
    out[0] = a * y[0] + b * y[1] + c * y[2];

    // Right edge
    let dx1 = x[n - 2] - x[n - 3];
    let dx2 = x[n - 1] - x[n - 2];
    let a = dx2 / (dx1 * (dx1 + dx2));
    let b = -(dx2 + dx1) / (dx1 * dx2);
    let c = (2.0 * dx2 + dx1) / (dx2 * (dx1 + dx2));
    out[n - 1] = a * y[n - 3] + b * y[n - 2] + c * y[n - 1];

    Ok(out)
}

/// Savitzky-Golay smoothing of uniformly sampled data
///
/// Fits a polynomial of degree `polyorder` over a sliding odd-length window
/// and replaces each point with the fitted value at the window centre. The
/// first and last half-windows are taken from the polynomial fitted to the
/// first and last full windows.
///
/// # Reference
/// Savitzky A, Golay MJE. Analytical Chemistry. 1964;36:1627-1639
pub fn savgol_smooth(y: &[f64], window: usize, polyorder: usize) -> Result<Vec<f64>> {
    let n = y.len();
    if window % 2 == 0 || window < 3 {
        return Err(GlufireError::invalid("savgol window must be odd and >= 3"));
    }
    if polyorder >= window {
        return Err(GlufireError::invalid("savgol polyorder must be below the window length"));
    }
    if window > n {
        return Err(GlufireError::invalid(format!(
            "savgol window {} exceeds series length {}",
            window, n
        )));
    }

    let half = window / 2;
    let cols = polyorder + 1;

    // Vandermonde matrix on offsets -half..=half
    let design = DMatrix::from_fn(window, cols, |i, j| (i as f64 - half as f64).powi(j as i32));
    let normal = design.transpose() * &design;
    let inverse = normal
        .try_inverse()
        .ok_or_else(|| GlufireError::invalid("savgol normal matrix is singular"))?;
    // Rows of `projector` map a window of samples onto polynomial coefficients
    let projector = inverse * design.transpose();

    let mut out = vec![0.0; n];
    for i in half..n - half {
        let mut acc = 0.0;
        for k in 0..window {
            acc += projector[(0, k)] * y[i - half + k];
        }
        out[i] = acc;
    }

    let fit_and_eval = |start: usize, positions: std::ops::Range<usize>, out: &mut [f64]| {
        let mut coeffs = vec![0.0; cols];
        for (j, coeff) in coeffs.iter_mut().enumerate() {
            for k in 0..window {
                *coeff += projector[(j, k)] * y[start + k];
            }
        }
        for pos in positions {
            let offset = pos as f64 - (start + half) as f64;
            out[pos] = coeffs
                .iter()
                .enumerate()
                .map(|(j, c)| c * offset.powi(j as i32))
                .sum();
        }
    };
    fit_and_eval(0, 0..half, &mut out);
    fit_and_eval(n - window, n - half..n, &mut out);

    Ok(out)
}
