//! Promoter transfer functions.
//!
//! Each arm of the AND gate is a promoter whose output depends on one
//! environmental input:
//! - pPept: oxygen-repressed (FNR-dependent), output falls as O2 rises
//! - pL/pR with a thermolabile cI857 repressor: output rises with temperature
//!
//! An arm is described either by a Hill curve fitted to dose-response data or
//! by a two-state thermal unfolding switch with high-temperature damage.
//!
//! References:
//! - Alon U. An Introduction to Systems Biology. 2nd ed. CRC Press, 2019
//! - Piraner DI et al. Nat Chem Biol. 2017;13:75-80 (tunable thermal bioswitches)

use serde::{Deserialize, Serialize};

use crate::numerics::kinetics::{hill_activation, hill_repression};

/// Direction of a promoter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoterMode {
    /// Output increases with input
    Activating,
    /// Output decreases with input
    Repressing,
}

impl PromoterMode {
    /// Parse a mode label such as "act", "rep", "repressing" or "inhibitory"
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_ascii_lowercase();
        if lower.starts_with("rep") || lower.contains("inh") {
            PromoterMode::Repressing
        } else {
            PromoterMode::Activating
        }
    }

    /// Short label used in calibration files
    pub fn label(&self) -> &'static str {
        match self {
            PromoterMode::Activating => "act",
            PromoterMode::Repressing => "rep",
        }
    }
}

/// Hill promoter parameters
///
/// Activating: y = leaky + beta * x^n / (K^n + x^n)
/// Repressing: y = leaky + beta / (1 + (x/K)^n)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillParameters {
    /// Maximum amplitude above baseline (reporter units)
    pub beta: f64,
    /// Half-saturation input level
    pub K: f64,
    /// Hill coefficient
    pub n: f64,
    /// Baseline output
    pub leaky: f64,
    pub mode: PromoterMode,
}

impl Default for HillParameters {
    fn default() -> Self {
        Self::lr_heat()
    }
}

impl HillParameters {
    /// pPept oxygen response: repressed above ~5 % O2
    pub fn pept_oxygen() -> Self {
        Self {
            beta: 1200.0,
            K: 5.0,     // % O2
            n: 2.0,
            leaky: 50.0,
            mode: PromoterMode::Repressing,
        }
    }

    /// pL/pR heat response: sharp switch around 40 °C
    pub fn lr_heat() -> Self {
        Self {
            beta: 1500.0,
            K: 40.0,    // °C
            n: 8.0,
            leaky: 80.0,
            mode: PromoterMode::Activating,
        }
    }

    /// Promoter output at input level x
    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        let fraction = match self.mode {
            PromoterMode::Activating => hill_activation(x, self.K, self.n),
            PromoterMode::Repressing => hill_repression(x, self.K, self.n),
        };
        self.leaky + self.beta * fraction
    }
}

/// Promoter output for one input level
pub fn promoter_output(x: f64, params: &HillParameters) -> f64 {
    params.evaluate(x)
}

/// Promoter output for a batch of input levels
pub fn promoter_output_slice(xs: &[f64], params: &HillParameters) -> Vec<f64> {
    xs.iter().map(|&x| params.evaluate(x)).collect()
}

// ============================================================================
// Thermal unfolding switch
// ============================================================================

/// Two-state thermal switch with a damage penalty above a critical temperature
///
/// f_unfolded = 1 / (1 + exp(-s * dH * (1/Tm - 1/T) / R))
/// output = leaky + beta * f_unfolded, scaled by exp(-k_dmg * (T - T_dmg))
/// when T > T_dmg. Temperatures are taken in °C and converted to kelvin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalSwitchParameters {
    /// Melting temperature of the repressor (°C)
    pub Tm_C: f64,
    /// Unfolding enthalpy (kJ/mol)
    pub dH_kJ_per_mol: f64,
    /// Cooperativity scale of the transition
    pub steepness: f64,
    /// Maximum induced output
    pub beta: f64,
    /// Baseline output
    pub leaky: f64,
    /// Onset of heat damage (°C)
    pub T_damage_C: f64,
    /// Exponential loss per °C above the damage onset
    pub damage_rate_per_C: f64,
    /// Gas constant (kJ/mol/K)
    pub R_kJ_per_mol_K: f64,
}

impl Default for ThermalSwitchParameters {
    fn default() -> Self {
        Self {
            Tm_C: 40.305,
            dH_kJ_per_mol: 239.018,
            steepness: 5.0,
            beta: 89.349,
            leaky: 0.5,
            T_damage_C: 43.971,
            damage_rate_per_C: 1.738,
            R_kJ_per_mol_K: 8.314e-3,
        }
    }
}

const KELVIN_OFFSET: f64 = 273.15;

impl ThermalSwitchParameters {
    /// Fraction of repressor unfolded at temperature T (°C)
    pub fn unfolded_fraction(&self, temp_C: f64) -> f64 {
        let t_k = temp_C + KELVIN_OFFSET;
        let tm_k = self.Tm_C + KELVIN_OFFSET;
        let exponent = self.steepness * self.dH_kJ_per_mol * (1.0 / tm_k - 1.0 / t_k)
            / self.R_kJ_per_mol_K;
        // Keep exp() in range for extreme temperatures
        1.0 / (1.0 + (-exponent.clamp(-50.0, 50.0)).exp())
    }

    pub fn evaluate(&self, temp_C: f64) -> f64 {
        let mut output = self.leaky + self.beta * self.unfolded_fraction(temp_C);
        if temp_C > self.T_damage_C {
            output *= (-self.damage_rate_per_C * (temp_C - self.T_damage_C)).exp();
        }
        output
    }
}

/// Response model for one gate arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SensorModel {
    Hill(HillParameters),
    ThermalSwitch(ThermalSwitchParameters),
}

impl SensorModel {
    pub fn output(&self, x: f64) -> f64 {
        match self {
            SensorModel::Hill(p) => p.evaluate(x),
            SensorModel::ThermalSwitch(p) => p.evaluate(x),
        }
    }

    /// Hill parameters, when the arm is a Hill curve
    pub fn hill(&self) -> Option<&HillParameters> {
        match self {
            SensorModel::Hill(p) => Some(p),
            SensorModel::ThermalSwitch(_) => None,
        }
    }
}
