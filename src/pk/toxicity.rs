//! Neurotoxicity risk from a plasma glutamate curve.
//!
//! Time above a threshold is the trapezoidal integral of the indicator
//! C(t) >= threshold over the sample times.

use serde::{Deserialize, Serialize};

use crate::error::{GlufireError, Result};
use crate::numerics::stats;

/// Decision thresholds on plasma glutamate (µM)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToxicityThresholds {
    pub caution_uM: f64,
    pub danger_uM: f64,
}

impl Default for ToxicityThresholds {
    fn default() -> Self {
        Self {
            caution_uM: 100.0,
            danger_uM: 1000.0,
        }
    }
}

impl ToxicityThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.caution_uM < self.danger_uM) {
            return Err(GlufireError::invalid(format!(
                "caution threshold ({}) must be below danger threshold ({})",
                self.caution_uM, self.danger_uM
            )));
        }
        Ok(())
    }
}

/// Summary class of a risk report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Caution,
    Danger,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Caution => "CAUTION",
            RiskLevel::Danger => "DANGER",
        }
    }
}

/// Exposure summary of one plasma trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub max_plasma_uM: f64,
    pub time_above_caution_h: f64,
    pub time_above_danger_h: f64,
    pub flag_caution: bool,
    pub flag_danger: bool,
    pub caution_threshold_uM: f64,
    pub danger_threshold_uM: f64,
}

impl RiskReport {
    pub fn level(&self) -> RiskLevel {
        if self.flag_danger {
            RiskLevel::Danger
        } else if self.flag_caution {
            RiskLevel::Caution
        } else {
            RiskLevel::Safe
        }
    }

    pub fn print_summary(&self) {
        println!("=== Neurotoxicity Assessment ===");
        println!("Max plasma glutamate: {:.2} µM", self.max_plasma_uM);
        println!(
            "Time >= caution ({:.0} µM): {:.2} h",
            self.caution_threshold_uM, self.time_above_caution_h
        );
        println!(
            "Time >= danger ({:.0} µM):  {:.2} h",
            self.danger_threshold_uM, self.time_above_danger_h
        );
        let mark = match self.level() {
            RiskLevel::Safe => "✓",
            _ => "⚠️",
        };
        println!("{} Risk level: {}", mark, self.level().label());
    }
}

/// Maximum, time above each threshold and crossing flags of a plasma curve
pub fn assess_risk(plasma_uM: &[f64], t_h: &[f64], thresholds: &ToxicityThresholds) -> Result<RiskReport> {
    thresholds.validate()?;
    if plasma_uM.is_empty() {
        return Err(GlufireError::invalid("plasma trajectory is empty"));
    }
    if plasma_uM.len() != t_h.len() {
        return Err(GlufireError::invalid(format!(
            "plasma trajectory has {} samples but the time grid has {}",
            plasma_uM.len(),
            t_h.len()
        )));
    }

    let indicator = |threshold: f64| -> Vec<f64> {
        plasma_uM
            .iter()
            .map(|&c| if c >= threshold { 1.0 } else { 0.0 })
            .collect()
    };
    let above_caution = indicator(thresholds.caution_uM);
    let above_danger = indicator(thresholds.danger_uM);

    Ok(RiskReport {
        max_plasma_uM: plasma_uM.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        time_above_caution_h: stats::trapezoid(&above_caution, t_h),
        time_above_danger_h: stats::trapezoid(&above_danger, t_h),
        flag_caution: above_caution.iter().any(|v| *v > 0.0),
        flag_danger: above_danger.iter().any(|v| *v > 0.0),
        caution_threshold_uM: thresholds.caution_uM,
        danger_threshold_uM: thresholds.danger_uM,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_caution_is_safe() {
        let t = [0.0, 1.0, 2.0, 3.0];
        let c = [50.0, 80.0, 99.9, 60.0];
        let r = assess_risk(&c, &t, &ToxicityThresholds::default()).unwrap();
        assert!(!r.flag_caution && !r.flag_danger);
        assert_eq!(r.time_above_caution_h, 0.0);
        assert_eq!(r.level(), RiskLevel::Safe);
        assert_eq!(r.max_plasma_uM, 99.9);
    }

    #[test]
    fn test_single_danger_sample_flags() {
        let t = [0.0, 1.0, 2.0];
        let c = [50.0, 1500.0, 50.0];
        let r = assess_risk(&c, &t, &ToxicityThresholds::default()).unwrap();
        assert!(r.flag_danger && r.flag_caution);
        assert_eq!(r.level(), RiskLevel::Danger);
        // Indicator [0, 1, 0] integrates to 1 h
        assert!((r.time_above_danger_h - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let t = [0.0, 1.0];
        let r = assess_risk(&[100.0, 100.0], &t, &ToxicityThresholds::default()).unwrap();
        assert!(r.flag_caution);
        assert!((r.time_above_caution_h - 1.0).abs() < 1e-12);
        assert_eq!(r.level(), RiskLevel::Caution);
    }

    #[test]
    fn test_rejects_bad_input() {
        let thr = ToxicityThresholds::default();
        assert!(assess_risk(&[], &[], &thr).is_err());
        assert!(assess_risk(&[1.0, 2.0], &[0.0], &thr).is_err());
        let inverted = ToxicityThresholds {
            caution_uM: 2000.0,
            danger_uM: 1000.0,
        };
        assert!(assess_risk(&[1.0], &[0.0], &inverted).is_err());
    }
}
