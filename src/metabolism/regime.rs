//! Operating regimes of the engineered strain around a heat-shock stimulus.
//!
//! PreStimulus -> Active -> PostStimulusBuffer -> Recovery
//!
//! The regime is a pure function of time and the induced GDH fold, so it can
//! be evaluated inside the right-hand side and re-derived afterwards from a
//! stored trajectory. Each transition has its own predicate.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::numerics::Trajectory;

/// Named operating regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Before the stimulus; homeostasis holds glutamate at its target
    PreStimulus,
    /// Enzymes induced; glutamate accumulates inside the cell
    Active,
    /// Short window after induction fades; export is boosted
    PostStimulusBuffer,
    /// Return toward homeostasis with increasing clearance
    Recovery,
}

impl Regime {
    pub fn label(&self) -> &'static str {
        match self {
            Regime::PreStimulus => "pre-stimulus",
            Regime::Active => "active",
            Regime::PostStimulusBuffer => "post-stimulus buffer",
            Regime::Recovery => "recovery",
        }
    }

    /// Whether intracellular homeostasis toward the target is switched on
    pub fn homeostasis_enabled(&self) -> bool {
        matches!(self, Regime::PreStimulus | Regime::Recovery)
    }
}

/// Timing of the stimulus and the induction level counted as active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeSchedule {
    /// Heat shock start (h)
    pub stimulus_onset_h: f64,
    /// Heat shock end (h)
    pub stimulus_end_h: f64,
    /// Length of the post-stimulus buffer (h)
    pub buffer_h: f64,
    /// fold_GDH above which the strain counts as induced
    pub active_fold_threshold: f64,
}

impl Default for RegimeSchedule {
    fn default() -> Self {
        Self {
            stimulus_onset_h: 8.0,
            stimulus_end_h: 12.0,
            buffer_h: 2.0,
            active_fold_threshold: 10.0,
        }
    }
}

/// t < stimulus onset
pub fn before_stimulus(schedule: &RegimeSchedule, t: f64) -> bool {
    t < schedule.stimulus_onset_h
}

/// GDH is induced above the active threshold
pub fn is_induced(schedule: &RegimeSchedule, fold_gdh: f64) -> bool {
    fold_gdh > schedule.active_fold_threshold
}

/// Less than `buffer_h` has passed since the stimulus ended
pub fn within_buffer(schedule: &RegimeSchedule, t: f64) -> bool {
    t - schedule.stimulus_end_h < schedule.buffer_h
}

/// The stimulus window has closed
pub fn stimulus_over(schedule: &RegimeSchedule, t: f64) -> bool {
    t > schedule.stimulus_end_h
}

/// Regime at time t given the current GDH fold
pub fn classify(schedule: &RegimeSchedule, t: f64, fold_gdh: f64) -> Regime {
    if before_stimulus(schedule, t) {
        Regime::PreStimulus
    } else if is_induced(schedule, fold_gdh) {
        Regime::Active
    } else if within_buffer(schedule, t) {
        Regime::PostStimulusBuffer
    } else {
        Regime::Recovery
    }
}

/// Extracellular clearance multiplier for a regime
///
/// Recovery ramps linearly from 1 at the end of the buffer up to 3.
pub fn clearance_multiplier(schedule: &RegimeSchedule, regime: Regime, t: f64) -> f64 {
    match regime {
        Regime::PreStimulus => 1.0,
        Regime::Active => 0.01,
        Regime::PostStimulusBuffer => 0.2,
        Regime::Recovery => {
            let since = t - schedule.stimulus_end_h - schedule.buffer_h;
            (1.0 + 0.2 * since.max(0.0)).min(3.0)
        }
    }
}

/// Regime at each sample of a strain trajectory
pub fn regime_timeline(schedule: &RegimeSchedule, traj: &Trajectory) -> Result<Vec<Regime>> {
    let fold = traj.column("fold_GDH")?;
    Ok(traj
        .t
        .iter()
        .zip(&fold)
        .map(|(&t, &f)| classify(schedule, t, f))
        .collect())
}

/// Time of the first entry into each regime, in order of appearance
pub fn transitions(t: &[f64], regimes: &[Regime]) -> Vec<(f64, Regime)> {
    let mut out: Vec<(f64, Regime)> = Vec::new();
    for (&time, &regime) in t.iter().zip(regimes) {
        if out.last().map(|(_, r)| *r) != Some(regime) {
            out.push((time, regime));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_each_regime() {
        let s = RegimeSchedule::default();
        assert_eq!(classify(&s, 2.0, 500.0), Regime::PreStimulus);
        assert_eq!(classify(&s, 9.0, 50.0), Regime::Active);
        assert_eq!(classify(&s, 9.0, 5.0), Regime::PostStimulusBuffer);
        assert_eq!(classify(&s, 13.0, 5.0), Regime::PostStimulusBuffer);
        assert_eq!(classify(&s, 14.5, 5.0), Regime::Recovery);
        // Induction keeps the strain active after the stimulus window
        assert_eq!(classify(&s, 20.0, 11.0), Regime::Active);
    }

    #[test]
    fn test_predicate_boundaries() {
        let s = RegimeSchedule::default();
        assert!(before_stimulus(&s, 7.999));
        assert!(!before_stimulus(&s, 8.0));
        assert!(!is_induced(&s, 10.0));
        assert!(is_induced(&s, 10.001));
        assert!(within_buffer(&s, 13.999));
        assert!(!within_buffer(&s, 14.0));
        assert!(!stimulus_over(&s, 12.0));
        assert!(stimulus_over(&s, 12.1));
    }

    #[test]
    fn test_clearance_multiplier_ramp() {
        let s = RegimeSchedule::default();
        assert_eq!(clearance_multiplier(&s, Regime::Active, 10.0), 0.01);
        assert!((clearance_multiplier(&s, Regime::Recovery, 14.0) - 1.0).abs() < 1e-12);
        assert!((clearance_multiplier(&s, Regime::Recovery, 19.0) - 2.0).abs() < 1e-12);
        assert_eq!(clearance_multiplier(&s, Regime::Recovery, 40.0), 3.0);
    }

    #[test]
    fn test_transitions_collapse_runs() {
        let t = [0.0, 1.0, 2.0, 3.0, 4.0];
        let r = [
            Regime::PreStimulus,
            Regime::PreStimulus,
            Regime::Active,
            Regime::Active,
            Regime::Recovery,
        ];
        let tr = transitions(&t, &r);
        assert_eq!(
            tr,
            vec![
                (0.0, Regime::PreStimulus),
                (2.0, Regime::Active),
                (4.0, Regime::Recovery)
            ]
        );
    }

    #[test]
    fn test_homeostasis_only_outside_stimulus() {
        assert!(Regime::PreStimulus.homeostasis_enabled());
        assert!(Regime::Recovery.homeostasis_enabled());
        assert!(!Regime::Active.homeostasis_enabled());
        assert!(!Regime::PostStimulusBuffer.homeostasis_enabled());
    }
}
