//! Time-varying scalar inputs for ODE right-hand sides.
//!
//! A model input is either a constant or a sampled series with a fixed
//! interpolation rule. The choice is made once, when the signal is built,
//! so the right-hand side only ever calls [`Signal::value_at`].

use serde::{Deserialize, Serialize};

use crate::error::{GlufireError, Result};

/// Interpolation between samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Piecewise linear
    Linear,
    /// Zero-order hold: the most recent sample at or before t
    Previous,
}

/// Scalar input signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Constant {
        value: f64,
    },
    Sampled {
        times: Vec<f64>,
        values: Vec<f64>,
        interpolation: Interpolation,
    },
}

impl Signal {
    pub fn constant(value: f64) -> Self {
        Signal::Constant { value }
    }

    /// Sampled signal; times must be finite and strictly increasing
    pub fn sampled(times: Vec<f64>, values: Vec<f64>, interpolation: Interpolation) -> Result<Self> {
        if times.is_empty() {
            return Err(GlufireError::invalid("sampled signal needs at least one point"));
        }
        if times.len() != values.len() {
            return Err(GlufireError::invalid(format!(
                "sampled signal has {} times but {} values",
                times.len(),
                values.len()
            )));
        }
        if times.iter().chain(values.iter()).any(|v| !v.is_finite()) {
            return Err(GlufireError::invalid("sampled signal contains non-finite values"));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(GlufireError::invalid("sampled signal times must be strictly increasing"));
        }
        Ok(Signal::Sampled {
            times,
            values,
            interpolation,
        })
    }

    /// Rectangular pulse: `high` on [start, start + duration), `low` elsewhere
    ///
    /// Heat-shock protocols are built this way, e.g. 50 AU baseline with a
    /// 3000 AU pulse from 8 h to 12 h.
    pub fn step_pulse(low: f64, high: f64, start_h: f64, duration_h: f64) -> Result<Self> {
        if !(duration_h > 0.0) {
            return Err(GlufireError::invalid("pulse duration must be > 0"));
        }
        let end_h = start_h + duration_h;
        if start_h <= 0.0 {
            return Signal::sampled(vec![start_h, end_h], vec![high, low], Interpolation::Previous);
        }
        Signal::sampled(
            vec![0.0, start_h, end_h],
            vec![low, high, low],
            Interpolation::Previous,
        )
    }

    /// Default heat-shock protocol: 50 -> 3000 AU on [8, 12) h
    pub fn heat_shock_protocol() -> Self {
        Signal::Sampled {
            times: vec![0.0, 8.0, 12.0],
            values: vec![50.0, 3000.0, 50.0],
            interpolation: Interpolation::Previous,
        }
    }

    /// Value at time t; clamps to the end samples outside the sampled range
    pub fn value_at(&self, t: f64) -> f64 {
        match self {
            Signal::Constant { value } => *value,
            Signal::Sampled {
                times,
                values,
                interpolation,
            } => {
                let last = times.len() - 1;
                if t <= times[0] {
                    return values[0];
                }
                if t >= times[last] {
                    return values[last];
                }
                // First index with times[idx] > t; idx is in 1..=last here
                let idx = times.partition_point(|&s| s <= t);
                match interpolation {
                    Interpolation::Previous => values[idx - 1],
                    Interpolation::Linear => {
                        let (t0, t1) = (times[idx - 1], times[idx]);
                        let frac = (t - t0) / (t1 - t0);
                        values[idx - 1] + frac * (values[idx] - values[idx - 1])
                    }
                }
            }
        }
    }

    /// Apply `f` to every value, keeping the time base
    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        match self {
            Signal::Constant { value } => Signal::Constant { value: f(*value) },
            Signal::Sampled {
                times,
                values,
                interpolation,
            } => Signal::Sampled {
                times: times.clone(),
                values: values.iter().map(|v| f(*v)).collect(),
                interpolation: *interpolation,
            },
        }
    }

    /// Largest value the signal takes
    pub fn max_value(&self) -> f64 {
        match self {
            Signal::Constant { value } => *value,
            Signal::Sampled { values, .. } => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl From<f64> for Signal {
    fn from(value: f64) -> Self {
        Signal::constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let s = Signal::constant(3.5);
        assert_eq!(s.value_at(-10.0), 3.5);
        assert_eq!(s.value_at(1e6), 3.5);
    }

    #[test]
    fn test_linear_interpolation_and_clamping() {
        let s = Signal::sampled(vec![0.0, 10.0], vec![0.0, 100.0], Interpolation::Linear).unwrap();
        assert!((s.value_at(2.5) - 25.0).abs() < 1e-12);
        assert_eq!(s.value_at(-1.0), 0.0);
        assert_eq!(s.value_at(50.0), 100.0);
    }

    #[test]
    fn test_previous_holds_value() {
        let s = Signal::heat_shock_protocol();
        assert_eq!(s.value_at(7.999), 50.0);
        assert_eq!(s.value_at(8.0), 3000.0);
        assert_eq!(s.value_at(11.9), 3000.0);
        assert_eq!(s.value_at(12.0), 50.0);
        assert_eq!(s.value_at(48.0), 50.0);
    }

    #[test]
    fn test_step_pulse_matches_protocol() {
        assert_eq!(
            Signal::step_pulse(50.0, 3000.0, 8.0, 4.0).unwrap(),
            Signal::heat_shock_protocol()
        );
        let immediate = Signal::step_pulse(0.0, 1.0, 0.0, 2.0).unwrap();
        assert_eq!(immediate.value_at(0.0), 1.0);
        assert_eq!(immediate.value_at(2.5), 0.0);
        assert!(Signal::step_pulse(0.0, 1.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_rejects_unsorted_times() {
        assert!(Signal::sampled(vec![0.0, 0.0], vec![1.0, 2.0], Interpolation::Linear).is_err());
        assert!(Signal::sampled(vec![0.0, 1.0], vec![1.0], Interpolation::Linear).is_err());
    }

    #[test]
    fn test_map_keeps_times() {
        let s = Signal::heat_shock_protocol().map(|v| v * 2.0);
        assert_eq!(s.value_at(9.0), 6000.0);
        assert_eq!(s.max_value(), 6000.0);
    }
}
