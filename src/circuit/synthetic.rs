//! Reproducible synthetic dose-response measurements.
//!
//! Generates replicate reporter readings from a known promoter with
//! multiplicative Gaussian noise, for fit validation and the CLI demo.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::fitting::DoseResponse;
use super::promoter::HillParameters;
use crate::error::{GlufireError, Result};

/// Oxygen levels (%) of the standard pPept characterisation
pub const OXYGEN_LEVELS: [f64; 8] = [0.0, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 21.0];

/// Temperatures (°C) of the standard pL/pR characterisation
pub const TEMPERATURE_LEVELS: [f64; 9] = [30.0, 33.0, 36.0, 37.0, 38.0, 40.0, 42.0, 44.0, 46.0];

/// Replicate rows (input, reading) drawn around the promoter curve
///
/// Each reading is `y_true * (1 + e)` with `e ~ N(0, noise_cv)`, floored at 0.
pub fn replicate_rows(
    params: &HillParameters,
    levels: &[f64],
    replicates: usize,
    noise_cv: f64,
    seed: u64,
) -> Result<Vec<(f64, f64)>> {
    let noise = Normal::new(0.0, noise_cv)
        .map_err(|e| GlufireError::invalid(format!("noise level {}: {}", noise_cv, e)))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(levels.len() * replicates);
    for &x in levels {
        let y_true = params.evaluate(x);
        for _ in 0..replicates {
            let y = y_true * (1.0 + noise.sample(&mut rng));
            rows.push((x, y.max(0.0)));
        }
    }
    Ok(rows)
}

/// Replicate-averaged synthetic curve
pub fn dose_response(
    params: &HillParameters,
    levels: &[f64],
    replicates: usize,
    noise_cv: f64,
    seed: u64,
) -> Result<DoseResponse> {
    let rows = replicate_rows(params, levels, replicates, noise_cv, seed)?;
    DoseResponse::from_replicates(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_data() {
        let p = HillParameters::pept_oxygen();
        let a = replicate_rows(&p, &OXYGEN_LEVELS, 3, 0.05, 7).unwrap();
        let b = replicate_rows(&p, &OXYGEN_LEVELS, 3, 0.05, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 24);
    }

    #[test]
    fn test_zero_noise_is_exact() {
        let p = HillParameters::lr_heat();
        let data = dose_response(&p, &TEMPERATURE_LEVELS, 2, 0.0, 1).unwrap();
        for (x, y) in data.x.iter().zip(&data.y) {
            assert!((p.evaluate(*x) - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_negative_noise_rejected() {
        let p = HillParameters::lr_heat();
        assert!(replicate_rows(&p, &TEMPERATURE_LEVELS, 2, -1.0, 1).is_err());
    }
}
