//! Tumour secretion flux into the PK model.
//!
//! Two sources:
//! - an analytic trapezoid (ramp up, plateau, ramp down)
//! - the time derivative of a simulated extracellular glutamate series,
//!   S(t) = 1000 * V_ext * dC/dt * leak_fraction, in µmol/h

use serde::{Deserialize, Serialize};

use crate::error::{GlufireError, Result};
use crate::numerics::stats;

/// Piecewise-linear secretion profile (µmol/h)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapezoidFlux {
    /// Secretion starts (h)
    pub t_on_h: f64,
    /// Ramp-down starts (h)
    pub t_off_h: f64,
    /// Duration of each ramp (h)
    pub ramp_h: f64,
    pub peak_umol_per_h: f64,
}

impl Default for TrapezoidFlux {
    fn default() -> Self {
        Self {
            t_on_h: 8.0,
            t_off_h: 34.0,
            ramp_h: 2.0,
            peak_umol_per_h: 0.0,
        }
    }
}

impl TrapezoidFlux {
    pub fn new(t_on_h: f64, t_off_h: f64, ramp_h: f64, peak_umol_per_h: f64) -> Result<Self> {
        let flux = Self {
            t_on_h,
            t_off_h,
            ramp_h,
            peak_umol_per_h,
        };
        flux.validate()?;
        Ok(flux)
    }

    /// Plateau starts one ramp after onset
    pub fn t_plateau_h(&self) -> f64 {
        self.t_on_h + self.ramp_h
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.ramp_h > 0.0) {
            return Err(GlufireError::invalid("ramp duration must be > 0"));
        }
        if self.t_off_h < self.t_plateau_h() {
            return Err(GlufireError::invalid("secretion must switch off after the plateau starts"));
        }
        Ok(())
    }

    /// Flux at time t
    pub fn value_at(&self, t: f64) -> f64 {
        let peak = self.peak_umol_per_h;
        let plateau = self.t_plateau_h();
        if self.t_on_h <= t && t < plateau {
            peak * (t - self.t_on_h) / self.ramp_h
        } else if plateau <= t && t < self.t_off_h {
            peak
        } else if self.t_off_h <= t && t < self.t_off_h + self.ramp_h {
            peak * (1.0 - (t - self.t_off_h) / self.ramp_h)
        } else {
            0.0
        }
    }

    /// Flux sampled on a time grid
    pub fn sample(&self, grid: &[f64]) -> Vec<f64> {
        grid.iter().map(|&t| self.value_at(t)).collect()
    }
}

/// How a concentration series is turned into a flux
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxOptions {
    /// Savitzky-Golay window (odd); `None` differentiates the raw series
    pub savgol_window: Option<usize>,
    pub savgol_polyorder: usize,
    /// Fraction of the local secretion that reaches circulation
    pub leak_fraction: f64,
    /// Drop net uptake (negative flux)
    pub clip_negative: bool,
}

impl Default for FluxOptions {
    fn default() -> Self {
        Self {
            savgol_window: None,
            savgol_polyorder: 2,
            leak_fraction: 1.0,
            clip_negative: true,
        }
    }
}

/// Secretion flux (µmol/h) from an extracellular glutamate series (mM)
///
/// V_ext is treated as constant, so d(C*V)/dt = V * dC/dt. mM * L is mmol,
/// hence the factor 1000 to µmol.
pub fn derive_secretion_flux(
    t_h: &[f64],
    glu_extra_mM: &[f64],
    V_ext_L: f64,
    options: &FluxOptions,
) -> Result<Vec<f64>> {
    if !(V_ext_L > 0.0) {
        return Err(GlufireError::invalid(format!("V_ext must be > 0, got {}", V_ext_L)));
    }
    if !(0.0..=1.0).contains(&options.leak_fraction) {
        return Err(GlufireError::invalid(format!(
            "leak fraction must be in [0, 1], got {}",
            options.leak_fraction
        )));
    }

    let smoothed;
    let series = match options.savgol_window {
        Some(window) => {
            smoothed = stats::savgol_smooth(glu_extra_mM, window, options.savgol_polyorder)?;
            &smoothed[..]
        }
        None => glu_extra_mM,
    };

    let dc_dt = stats::gradient(series, t_h)?;
    let scale = 1000.0 * V_ext_L * options.leak_fraction;
    let mut flux: Vec<f64> = dc_dt.iter().map(|d| d * scale).collect();

    if options.clip_negative {
        let clipped = flux.iter().filter(|v| **v < 0.0).count();
        if clipped > 0 {
            log::warn!(
                "Clipped {} of {} negative secretion flux samples to 0",
                clipped,
                flux.len()
            );
            for v in flux.iter_mut() {
                *v = v.max(0.0);
            }
        }
    }
    Ok(flux)
}
