//! Split-T7 AND gate.
//!
//! Each promoter drives one half of a split T7 RNA polymerase. Activity needs
//! both halves to meet, which is modelled as saturable binding on the product
//! of the two promoter outputs:
//!
//! T7 = leaky + alpha * A*B / (Kd + A*B)
//!
//! If either arm is silent the product vanishes and the gate falls back to its
//! leak, whatever the other arm does.
//!
//! Reference: Shis DL, Bennett MR. PNAS. 2013;110:5028-5033 (split T7 logic)

use std::fmt;

use serde::{Deserialize, Serialize};

use super::promoter::{HillParameters, SensorModel};
use crate::error::{GlufireError, Result};
use crate::numerics::signal::{Interpolation, Signal};

/// Reconstitution parameters of the split polymerase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParameters {
    /// Maximum T7 activity above leak (AU)
    pub alpha: f64,
    /// Half-saturation of the A*B product (AU^2)
    pub Kd: f64,
    /// Activity with no reconstitution (AU)
    pub leaky: f64,
}

impl Default for GateParameters {
    fn default() -> Self {
        Self {
            alpha: 2500.0,  // Puts the ON state near 2100 AU
            Kd: 2.0e5,      // Between the OFF and ON arm products
            leaky: 0.0,
        }
    }
}

impl GateParameters {
    /// Gate activity from the two promoter outputs
    #[inline]
    pub fn combine(&self, a: f64, b: f64) -> f64 {
        let product = (a * b).max(0.0);
        self.leaky + self.alpha * product / (self.Kd + product + crate::numerics::DENOMINATOR_EPS)
    }
}

/// Gate activity from the two raw environmental signals
///
/// Each signal goes through its own promoter (mode-aware Hill curve) before
/// the outputs are combined.
pub fn gate_activity(
    signal_a: f64,
    signal_b: f64,
    promoter_a: &HillParameters,
    promoter_b: &HillParameters,
    gate: &GateParameters,
) -> f64 {
    gate.combine(promoter_a.evaluate(signal_a), promoter_b.evaluate(signal_b))
}

/// Batch form of [`gate_activity`] over paired signal arrays
pub fn gate_activity_slice(
    signals_a: &[f64],
    signals_b: &[f64],
    promoter_a: &HillParameters,
    promoter_b: &HillParameters,
    gate: &GateParameters,
) -> Result<Vec<f64>> {
    if signals_a.len() != signals_b.len() {
        return Err(GlufireError::invalid(format!(
            "gate inputs differ in length: {} vs {}",
            signals_a.len(),
            signals_b.len()
        )));
    }
    Ok(signals_a
        .iter()
        .zip(signals_b)
        .map(|(&a, &b)| gate_activity(a, b, promoter_a, promoter_b, gate))
        .collect())
}

// ============================================================================
// Assembled gate: oxygen arm x heat arm
// ============================================================================

/// One evaluated environmental condition
#[derive(Debug, Clone, Serialize)]
pub struct ConditionPoint {
    pub o2_percent: f64,
    pub temp_C: f64,
    /// Oxygen-arm promoter output
    pub arm_a: f64,
    /// Heat-arm promoter output
    pub arm_b: f64,
    pub t7_activity: f64,
}

/// ON/OFF discrimination of the gate
#[derive(Debug, Clone, Serialize)]
pub struct SafetyMetrics {
    /// Activity at hypoxia + heat (1 % O2, 42 °C)
    pub on_activity: f64,
    /// Each OFF condition with its activity
    pub off_points: Vec<ConditionPoint>,
    /// Highest OFF-state activity
    pub max_off_activity: f64,
    /// on / max_off; infinite when every OFF state is exactly zero
    pub on_off_ratio: f64,
}

impl SafetyMetrics {
    /// Print a human-readable summary
    pub fn print_summary(&self) {
        println!("=== AND Gate Safety ===");
        println!("  ON  (1% O2, 42°C):  {:>9.1} AU", self.on_activity);
        for p in &self.off_points {
            println!(
                "  OFF ({}% O2, {}°C): {:>9.1} AU",
                p.o2_percent, p.temp_C, p.t7_activity
            );
        }
        println!("  ON/OFF ratio:       {:>9.2}", self.on_off_ratio);
        if self.on_off_ratio >= 2.0 {
            println!("  ✓ ON state clearly above every OFF state");
        } else {
            println!("  ⚠️ Weak ON/OFF discrimination");
        }
    }
}

/// Oxygen-sensing arm, heat-sensing arm and the reconstitution step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndGate {
    pub oxygen_arm: SensorModel,
    pub heat_arm: SensorModel,
    pub gate: GateParameters,
}

impl Default for AndGate {
    fn default() -> Self {
        Self {
            oxygen_arm: SensorModel::Hill(HillParameters::pept_oxygen()),
            heat_arm: SensorModel::Hill(HillParameters::lr_heat()),
            gate: GateParameters::default(),
        }
    }
}

/// Grid used for the standard condition scan
pub const SCAN_O2_PERCENT: [f64; 3] = [1.0, 5.0, 21.0];
pub const SCAN_TEMP_C: [f64; 3] = [37.0, 42.0, 45.0];

/// ON condition (tumour core under hyperthermia)
pub const ON_CONDITION: (f64, f64) = (1.0, 42.0);
/// OFF conditions: normal tissue, heated normal tissue, unheated tumour
pub const OFF_CONDITIONS: [(f64, f64); 3] = [(21.0, 37.0), (21.0, 42.0), (1.0, 37.0)];

impl AndGate {
    pub fn new(oxygen_arm: SensorModel, heat_arm: SensorModel, gate: GateParameters) -> Self {
        Self {
            oxygen_arm,
            heat_arm,
            gate,
        }
    }

    /// Gate built from two Hill promoters
    pub fn from_promoters(oxygen: HillParameters, heat: HillParameters, gate: GateParameters) -> Self {
        Self::new(SensorModel::Hill(oxygen), SensorModel::Hill(heat), gate)
    }

    /// Promoter outputs (A, B) at one condition
    pub fn arm_outputs(&self, o2_percent: f64, temp_C: f64) -> (f64, f64) {
        (self.oxygen_arm.output(o2_percent), self.heat_arm.output(temp_C))
    }

    /// T7 activity at one condition
    pub fn activity(&self, o2_percent: f64, temp_C: f64) -> f64 {
        let (a, b) = self.arm_outputs(o2_percent, temp_C);
        self.gate.combine(a, b)
    }

    /// Response surface: rows follow `o2_levels`, columns follow `temps`
    pub fn activity_grid(&self, o2_levels: &[f64], temps: &[f64]) -> Vec<Vec<f64>> {
        o2_levels
            .iter()
            .map(|&o2| temps.iter().map(|&t| self.activity(o2, t)).collect())
            .collect()
    }

    pub fn evaluate_point(&self, o2_percent: f64, temp_C: f64) -> ConditionPoint {
        let (arm_a, arm_b) = self.arm_outputs(o2_percent, temp_C);
        ConditionPoint {
            o2_percent,
            temp_C,
            arm_a,
            arm_b,
            t7_activity: self.gate.combine(arm_a, arm_b),
        }
    }

    /// Activity at every combination of O2 {1, 5, 21} % and T {37, 42, 45} °C
    pub fn condition_scan(&self) -> Vec<ConditionPoint> {
        let mut points = Vec::with_capacity(SCAN_O2_PERCENT.len() * SCAN_TEMP_C.len());
        for &o2 in &SCAN_O2_PERCENT {
            for &temp in &SCAN_TEMP_C {
                points.push(self.evaluate_point(o2, temp));
            }
        }
        points
    }

    pub fn safety_metrics(&self) -> SafetyMetrics {
        let on_activity = self.activity(ON_CONDITION.0, ON_CONDITION.1);
        let off_points: Vec<ConditionPoint> = OFF_CONDITIONS
            .iter()
            .map(|&(o2, t)| self.evaluate_point(o2, t))
            .collect();
        let max_off_activity = off_points
            .iter()
            .map(|p| p.t7_activity)
            .fold(f64::NEG_INFINITY, f64::max);
        let on_off_ratio = if max_off_activity > 0.0 {
            on_activity / max_off_activity
        } else {
            f64::INFINITY
        };
        SafetyMetrics {
            on_activity,
            off_points,
            max_off_activity,
            on_off_ratio,
        }
    }
}

// ============================================================================
// Environment schedules
// ============================================================================

/// Time course of oxygen and temperature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSchedule {
    pub times_h: Vec<f64>,
    pub o2_percent: Vec<f64>,
    pub temp_C: Vec<f64>,
}

impl EnvironmentSchedule {
    /// Fixed condition for the whole run
    pub fn constant(o2_percent: f64, temp_C: f64) -> Self {
        Self {
            times_h: vec![0.0],
            o2_percent: vec![o2_percent],
            temp_C: vec![temp_C],
        }
    }

    /// Hyperthermia episode: `shock_C` on [start, start + duration), `base_C` elsewhere
    pub fn heat_shock(o2_percent: f64, base_C: f64, shock_C: f64, start_h: f64, duration_h: f64) -> Self {
        Self {
            times_h: vec![0.0, start_h, start_h + duration_h],
            o2_percent: vec![o2_percent; 3],
            temp_C: vec![base_C, shock_C, base_C],
        }
    }

    fn validate(&self) -> Result<()> {
        let n = self.times_h.len();
        if n == 0 || self.o2_percent.len() != n || self.temp_C.len() != n {
            return Err(GlufireError::invalid(
                "environment schedule needs equal, non-empty time, O2 and temperature series",
            ));
        }
        Ok(())
    }

    /// Resolve the schedule into a T7 activity signal
    pub fn activity_signal(&self, gate: &AndGate, interpolation: Interpolation) -> Result<Signal> {
        self.resolve(interpolation, |o2, t| gate.activity(o2, t))
    }

    /// Resolve the schedule into the A*B product of the two arms
    pub fn product_signal(&self, gate: &AndGate, interpolation: Interpolation) -> Result<Signal> {
        self.resolve(interpolation, |o2, t| {
            let (a, b) = gate.arm_outputs(o2, t);
            a * b
        })
    }

    fn resolve<F: Fn(f64, f64) -> f64>(&self, interpolation: Interpolation, f: F) -> Result<Signal> {
        self.validate()?;
        let values: Vec<f64> = self
            .o2_percent
            .iter()
            .zip(&self.temp_C)
            .map(|(&o2, &t)| f(o2, t))
            .collect();
        if values.len() == 1 {
            return Ok(Signal::constant(values[0]));
        }
        Signal::sampled(self.times_h.clone(), values, interpolation)
    }
}

// ============================================================================
// Activity sources
// ============================================================================

/// Anything that turns an environment schedule into a T7 activity signal
///
/// `t_end_h` is the horizon the signal has to cover. Sources without memory
/// can ignore it.
pub trait ActivitySource: fmt::Debug + Send + Sync {
    fn activity_signal(&self, env: &EnvironmentSchedule, t_end_h: f64) -> Result<Signal>;
}

/// Instantaneous binding: activity follows the environment with no delay
impl ActivitySource for AndGate {
    fn activity_signal(&self, env: &EnvironmentSchedule, _t_end_h: f64) -> Result<Signal> {
        env.activity_signal(self, Interpolation::Linear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_property() {
        let gate = GateParameters::default();
        for other in [1.0, 1e3, 1e6, 1e9] {
            assert!((gate.combine(0.0, other) - gate.leaky).abs() < 1e-9);
            assert!((gate.combine(other, 0.0) - gate.leaky).abs() < 1e-9);
        }
    }

    #[test]
    fn test_saturation() {
        let gate = GateParameters {
            alpha: 100.0,
            Kd: 10.0,
            leaky: 5.0,
        };
        assert!((gate.combine(1e6, 1e6) - 105.0).abs() < 1e-6);
        // Half-maximal when A*B = Kd
        assert!((gate.combine(2.0, 5.0) - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_on_and_off_levels() {
        let gate = AndGate::default();
        let on = gate.activity(1.0, 42.0);
        let off = gate.activity(21.0, 37.0);
        assert!((on - 2136.0).abs() < 5.0, "ON activity {}", on);
        assert!((off - 641.0).abs() < 5.0, "OFF activity {}", off);
    }

    #[test]
    fn test_condition_scan_layout() {
        let scan = AndGate::default().condition_scan();
        assert_eq!(scan.len(), 9);
        assert_eq!((scan[0].o2_percent, scan[0].temp_C), (1.0, 37.0));
        assert_eq!((scan[8].o2_percent, scan[8].temp_C), (21.0, 45.0));
    }

    #[test]
    fn test_safety_ratio_infinite_when_off_is_zero() {
        let dead = GateParameters {
            alpha: 0.0,
            Kd: 2.0e5,
            leaky: 0.0,
        };
        let gate = AndGate::from_promoters(HillParameters::pept_oxygen(), HillParameters::lr_heat(), dead);
        let metrics = gate.safety_metrics();
        assert_eq!(metrics.max_off_activity, 0.0);
        assert!(metrics.on_off_ratio.is_infinite());
        assert_eq!(metrics.off_points.len(), 3);
    }

    #[test]
    fn test_schedule_resolution() {
        let gate = AndGate::default();
        let constant = EnvironmentSchedule::constant(1.0, 42.0)
            .activity_signal(&gate, Interpolation::Previous)
            .unwrap();
        assert!(matches!(constant, Signal::Constant { .. }));

        let shock = EnvironmentSchedule::heat_shock(1.0, 37.0, 42.0, 8.0, 4.0)
            .activity_signal(&gate, Interpolation::Previous)
            .unwrap();
        assert!((shock.value_at(10.0) - gate.activity(1.0, 42.0)).abs() < 1e-9);
        assert!((shock.value_at(20.0) - gate.activity(1.0, 37.0)).abs() < 1e-9);

        let bad = EnvironmentSchedule {
            times_h: vec![0.0, 1.0],
            o2_percent: vec![1.0],
            temp_C: vec![37.0, 42.0],
        };
        assert!(bad.activity_signal(&gate, Interpolation::Linear).is_err());
    }
}
