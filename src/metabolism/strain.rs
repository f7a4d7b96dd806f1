//! Central-carbon and nitrogen metabolism of the glutamate-producing strain.
//!
//! State (10):
//! [Glc_ext, NH4_ext, ICIT, AKG, Glu_in, NADPH, X, Glu_ext, fold_ICD, fold_GDH]
//!
//! Fluxes (per unit biomass X):
//! - Glucose uptake q = Vmax_glc * Glc / (Km_glc + Glc), growth mu = mu_max * Glc / (Km_glc + Glc)
//! - TCA influx f_TCA * q feeds isocitrate
//! - ICD: ICIT -> AKG, v = 25 * fold_ICD * ICIT / (Km + ICIT)
//! - GDH: AKG + NH4 + NADPH -> Glu, triple-saturating, scaled by fold_GDH
//! - NADPH from PPP (k_PPP * q) and ICD, relaxing to a set point
//!
//! The T7 input induces both enzymes: fold' = (1 + (max - 1) * H(T7) - fold) / tau.
//! Glutamate handling follows the [`Regime`] of the strain: export is
//! suppressed while it accumulates, boosted then decayed after the stimulus,
//! and homeostasis pulls it back to its target during recovery. Wild type has
//! no heterologous enzymes or exporter and holds Glu_in at the target.
//!
//! ICD turnover at 1000-fold induction makes the system stiff; the default
//! solver is the implicit SDIRK integrator.
//!
//! References:
//! - Shimizu H, Hirasawa T. Amino Acid Fermentation, 2017 (C. glutamicum glutamate production)
//! - Sauer U et al. J Biol Chem. 2004;279:6613-6619 (NADPH balance)

use serde::{Deserialize, Serialize};

use super::regime::{self, Regime, RegimeSchedule};
use crate::error::{GlufireError, Result};
use crate::numerics::kinetics::{hill_activation, michaelis_menten, saturation};
use crate::numerics::signal::Signal;
use crate::numerics::{integrate, stats, OdeSystem, SolverSettings, Trajectory};

/// Field names of the strain state vector
pub const STRAIN_STATE_NAMES: [&str; 10] = [
    "Glc_ext_mM",
    "NH4_ext_mM",
    "ICIT_mM",
    "AKG_mM",
    "Glu_in_mM",
    "NADPH_mM",
    "X_gDW_per_L",
    "Glu_ext_mM",
    "fold_ICD",
    "fold_GDH",
];

const GLC: usize = 0;
const NH4: usize = 1;
const ICIT: usize = 2;
const AKG: usize = 3;
const GLU_IN: usize = 4;
const NADPH: usize = 5;
const X: usize = 6;
const GLU_EXT: usize = 7;
const FOLD_ICD: usize = 8;
const FOLD_GDH: usize = 9;

/// Default starting culture
pub const DEFAULT_INITIAL_STATE: [f64; 10] = [50.0, 10.0, 0.1, 0.5, 20.0, 0.1, 0.1, 0.0, 1.0, 1.0];

/// Engineered strain or its wild-type parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrainKind {
    Engineered,
    Wildtype,
}

impl StrainKind {
    pub fn from_label(label: &str) -> Result<Self> {
        match label.to_ascii_lowercase().as_str() {
            "engineered" | "eng" => Ok(StrainKind::Engineered),
            "wildtype" | "wild_type" | "wt" => Ok(StrainKind::Wildtype),
            other => Err(GlufireError::invalid(format!("unknown strain '{}'", other))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrainKind::Engineered => "engineered",
            StrainKind::Wildtype => "wildtype",
        }
    }
}

/// Kinetic, induction and regime parameters of the strain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrainParameters {
    // Uptake and growth
    pub V_max_glc: f64,
    pub K_m_glc: f64,
    /// Fraction of glucose uptake entering the TCA cycle
    pub f_TCA: f64,
    pub mu_max_per_h: f64,
    pub k_maintenance_per_h: f64,

    // Enzymes at basal expression
    pub V_max_base_ICD: f64,
    pub K_m_ICD: f64,
    pub V_max_base_GDH: f64,
    pub K_m_AKG: f64,
    pub K_m_NH4: f64,
    pub K_m_NADPH: f64,

    // NADPH balance
    pub k_PPP: f64,
    pub y_ICD_NADPH: f64,
    pub lambda_NADPH_per_h: f64,
    pub NADPH_set_mM: f64,

    // T7 induction
    pub K_T7: f64,
    pub n_hill: f64,
    pub tau_enzyme_h: f64,
    pub fold_ICD_max: f64,
    pub fold_GDH_max: f64,

    // Homeostasis
    pub Glu_target_mM: f64,
    pub homeostasis_strength_per_h: f64,
    pub AKG_set_mM: f64,
    pub akg_homeostasis_per_h: f64,
    /// AKG homeostasis scale while GDH is induced
    pub akg_scale_active: f64,
    /// AKG homeostasis scale otherwise
    pub akg_scale_inactive: f64,

    // Export
    pub k_sec_base_per_h: f64,
    /// Fraction of k_sec * Glu_in that reaches the medium
    pub secretion_fraction: f64,
    /// Fraction of the secretion flux drained from the intracellular pool
    pub intracellular_export_loss: f64,
    /// Export is suppressed while the strain accumulates below this level (mM)
    pub accum_threshold_mM: f64,
    pub export_accum_suppression: f64,
    /// Glu_in above which the export boost applies (mM)
    pub boost_threshold_mM: f64,
    pub postshock_export_boost: f64,
    pub export_decay_rate_per_h: f64,
    pub extracellular_clearance_rate_per_h: f64,

    // Accumulation while induced
    pub accumulation_setpoint_mM: f64,
    pub accumulation_drive_mM_per_h: f64,

    pub schedule: RegimeSchedule,
}

impl Default for StrainParameters {
    fn default() -> Self {
        Self {
            V_max_glc: 10.0,
            K_m_glc: 1.0,
            f_TCA: 0.6,
            mu_max_per_h: 0.5,
            k_maintenance_per_h: 0.08,
            V_max_base_ICD: 25.0,
            K_m_ICD: 0.029,
            V_max_base_GDH: 30.0,
            K_m_AKG: 0.64,
            K_m_NH4: 1.1,
            K_m_NADPH: 0.04,
            k_PPP: 0.4,
            y_ICD_NADPH: 1.0,
            lambda_NADPH_per_h: 2.0,
            NADPH_set_mM: 0.15,
            K_T7: 800.0,
            n_hill: 3.0,
            tau_enzyme_h: 0.05,
            fold_ICD_max: 1000.0,
            fold_GDH_max: 1500.0,
            Glu_target_mM: 20.0,
            homeostasis_strength_per_h: 2.0,
            AKG_set_mM: 0.5,
            akg_homeostasis_per_h: 2.0,
            akg_scale_active: 0.1,
            akg_scale_inactive: 2.0,
            k_sec_base_per_h: 0.8,
            secretion_fraction: 0.1,
            intracellular_export_loss: 0.01,
            accum_threshold_mM: 55.0,
            export_accum_suppression: 0.05,
            boost_threshold_mM: 40.0,
            postshock_export_boost: 10.0,
            export_decay_rate_per_h: 0.8,
            extracellular_clearance_rate_per_h: 0.5,
            accumulation_setpoint_mM: 50.0,
            accumulation_drive_mM_per_h: 80.0,
            schedule: RegimeSchedule::default(),
        }
    }
}

impl StrainParameters {
    /// Engineered strain defaults
    pub fn engineered() -> Self {
        Self::default()
    }

    /// Parent strain: no induction, tighter homeostasis
    pub fn wildtype() -> Self {
        Self {
            fold_ICD_max: 1.0,
            fold_GDH_max: 1.0,
            homeostasis_strength_per_h: 5.0,
            ..Self::default()
        }
    }

    pub fn for_kind(kind: StrainKind) -> Self {
        match kind {
            StrainKind::Engineered => Self::engineered(),
            StrainKind::Wildtype => Self::wildtype(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("K_m_glc", self.K_m_glc),
            ("K_m_ICD", self.K_m_ICD),
            ("K_m_AKG", self.K_m_AKG),
            ("K_m_NH4", self.K_m_NH4),
            ("K_m_NADPH", self.K_m_NADPH),
            ("K_T7", self.K_T7),
            ("n_hill", self.n_hill),
            ("tau_enzyme_h", self.tau_enzyme_h),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(GlufireError::invalid(format!("{} must be > 0, got {}", name, value)));
            }
        }
        if self.fold_ICD_max < 1.0 || self.fold_GDH_max < 1.0 {
            return Err(GlufireError::invalid("enzyme fold maxima must be >= 1"));
        }
        Ok(())
    }

    /// Target fold for an enzyme with the given maximum
    pub fn fold_target(&self, t7: f64, fold_max: f64) -> f64 {
        1.0 + (fold_max - 1.0) * hill_activation(t7, self.K_T7, self.n_hill)
    }

    /// Secretion rate constant for the current regime and Glu_in
    pub fn secretion_rate(&self, regime: Regime, glu_in: f64) -> f64 {
        if regime == Regime::Active && glu_in < self.accum_threshold_mM {
            self.k_sec_base_per_h * self.export_accum_suppression
        } else if glu_in > self.boost_threshold_mM {
            self.k_sec_base_per_h * self.postshock_export_boost
        } else {
            self.k_sec_base_per_h
        }
    }

    /// Multiplicative decay of secretion once the stimulus is over
    pub fn export_decay(&self, regime: Regime, t: f64) -> f64 {
        if regime != Regime::Active && regime::stimulus_over(&self.schedule, t) {
            (-self.export_decay_rate_per_h * (t - self.schedule.stimulus_end_h)).exp() * 0.5
        } else {
            1.0
        }
    }

    /// Drive toward the accumulation set point while induced
    pub fn accumulation_drive(&self, regime: Regime, glu_in: f64) -> f64 {
        if regime != Regime::Active {
            return 0.0;
        }
        let gap = (self.accumulation_setpoint_mM - glu_in).max(0.0);
        self.accumulation_drive_mM_per_h * gap / self.accumulation_setpoint_mM
    }

    /// Homeostatic correction toward Glu_target, when the regime allows it
    pub fn homeostasis(&self, regime: Regime, glu_in: f64) -> f64 {
        if regime.homeostasis_enabled() {
            -self.homeostasis_strength_per_h * (glu_in - self.Glu_target_mM)
        } else {
            0.0
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// Strain metabolism model
#[derive(Debug, Clone)]
pub struct EngineeredStrain {
    pub kind: StrainKind,
    pub params: StrainParameters,
}

impl EngineeredStrain {
    pub fn new(kind: StrainKind, params: StrainParameters) -> Self {
        Self { kind, params }
    }

    pub fn engineered() -> Self {
        Self::new(StrainKind::Engineered, StrainParameters::engineered())
    }

    pub fn wildtype() -> Self {
        Self::new(StrainKind::Wildtype, StrainParameters::wildtype())
    }

    /// Stiff-capable default solver for this model
    pub fn default_solver() -> SolverSettings {
        SolverSettings {
            h_max: 0.25,
            ..SolverSettings::sdirk(1e-5, 1e-8)
        }
    }

    /// Regime of the strain at time t and state y
    pub fn regime(&self, t: f64, y: &[f64]) -> Regime {
        regime::classify(&self.params.schedule, t, y[FOLD_GDH])
    }

    /// d(state)/dt at time t under the given T7 activity
    pub fn derivative(&self, t: f64, y: &[f64], t7: &Signal) -> [f64; 10] {
        let p = &self.params;
        let glc = y[GLC].max(0.0);
        let nh4 = y[NH4].max(0.0);
        let icit = y[ICIT].max(0.0);
        let akg = y[AKG].max(0.0);
        let glu_in = y[GLU_IN].max(0.0);
        let nadph = y[NADPH].max(0.0);
        let x = y[X].max(0.0);
        let glu_ext = y[GLU_EXT].max(0.0);
        let fold_icd = y[FOLD_ICD];
        let fold_gdh = y[FOLD_GDH];

        let t7_now = t7.value_at(t);
        let regime = self.regime(t, y);

        let mu = p.mu_max_per_h * saturation(p.K_m_glc, glc);
        let q_glc = michaelis_menten(p.V_max_glc, p.K_m_glc, glc);
        let v_tca_in = p.f_TCA * q_glc;

        let v_icd = michaelis_menten(p.V_max_base_ICD * fold_icd, p.K_m_ICD, icit);
        let v_gdh = p.V_max_base_GDH
            * fold_gdh
            * saturation(p.K_m_AKG, akg)
            * saturation(p.K_m_NH4, nh4)
            * saturation(p.K_m_NADPH, nadph);

        let v_nadph = (p.k_PPP * q_glc + p.y_ICD_NADPH * v_icd) * x;
        let v_relax = p.lambda_NADPH_per_h * (p.NADPH_set_mM - nadph);

        let akg_scale = match self.kind {
            StrainKind::Wildtype => 1.0,
            StrainKind::Engineered if regime::is_induced(&p.schedule, fold_gdh) => p.akg_scale_active,
            StrainKind::Engineered => p.akg_scale_inactive,
        };
        let akg_homeostasis = -p.akg_homeostasis_per_h * (akg - p.AKG_set_mM) * akg_scale;

        let mut d = [0.0; 10];
        d[GLC] = -q_glc * x;
        d[NH4] = -v_gdh * x;
        d[ICIT] = (v_tca_in - v_icd) * x - mu * icit;
        d[AKG] = (v_icd - v_gdh) * x - mu * akg + akg_homeostasis;
        d[NADPH] = v_nadph - v_gdh * x + v_relax;
        d[X] = (mu - p.k_maintenance_per_h) * x;
        d[FOLD_ICD] = (p.fold_target(t7_now, p.fold_ICD_max) - fold_icd) / p.tau_enzyme_h;
        d[FOLD_GDH] = (p.fold_target(t7_now, p.fold_GDH_max) - fold_gdh) / p.tau_enzyme_h;

        match self.kind {
            StrainKind::Wildtype => {
                d[GLU_IN] = -p.homeostasis_strength_per_h * (glu_in - p.Glu_target_mM);
                d[GLU_EXT] = 0.0;
            }
            StrainKind::Engineered => {
                let k_sec = p.secretion_rate(regime, glu_in);
                let v_sec = k_sec * glu_in * p.secretion_fraction * p.export_decay(regime, t);
                let clearance = p.extracellular_clearance_rate_per_h
                    * regime::clearance_multiplier(&p.schedule, regime, t)
                    * glu_ext;
                d[GLU_IN] = v_gdh * x - v_sec * p.intracellular_export_loss * x - mu * glu_in
                    + p.homeostasis(regime, glu_in)
                    + p.accumulation_drive(regime, glu_in);
                d[GLU_EXT] = (v_sec - clearance) * x;
            }
        }
        d
    }

    /// Integrate on a uniform grid 0, dt, ..., t_end
    pub fn simulate(
        &self,
        t7: &Signal,
        t_end_h: f64,
        dt_h: f64,
        y0: Option<[f64; 10]>,
        settings: &SolverSettings,
    ) -> Result<Trajectory> {
        self.params.validate()?;
        if !(dt_h > 0.0) || !(t_end_h > dt_h) {
            return Err(GlufireError::invalid(format!(
                "need 0 < dt ({}) < t_end ({})",
                dt_h, t_end_h
            )));
        }
        let n = (t_end_h / dt_h).round() as usize + 1;
        let grid = stats::linspace(0.0, t_end_h, n);
        log::info!(
            "Simulating {} strain for {} h ({} samples)",
            self.kind.label(),
            t_end_h,
            n
        );
        let system = StrainSystem { model: self, t7 };
        integrate(&system, &y0.unwrap_or(DEFAULT_INITIAL_STATE), &grid, settings)
    }

    /// Heat-shock protocol run: 48 h at 0.1 h with the default solver
    pub fn simulate_heat_shock(&self) -> Result<Trajectory> {
        self.simulate(
            &Signal::heat_shock_protocol(),
            48.0,
            0.1,
            None,
            &Self::default_solver(),
        )
    }
}

struct StrainSystem<'a> {
    model: &'a EngineeredStrain,
    t7: &'a Signal,
}

impl OdeSystem for StrainSystem<'_> {
    fn ndim(&self) -> usize {
        10
    }

    fn state_names(&self) -> &'static [&'static str] {
        &STRAIN_STATE_NAMES
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        dydt.copy_from_slice(&self.model.derivative(t, y, self.t7));
    }

    fn project(&self, y: &mut [f64]) {
        for v in y.iter_mut() {
            *v = v.max(0.0);
        }
    }
}

// ============================================================================
// Performance analysis
// ============================================================================

/// Production targets of the heat-shock protocol
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceTargets {
    /// Peak Glu_in >= 45 mM
    pub intracellular_peak: bool,
    /// Peak Glu_ext >= 30 mM
    pub extracellular_peak: bool,
    /// Final Glu_in within 8 mM of 20 mM
    pub final_recovery: bool,
}

impl PerformanceTargets {
    pub fn all_met(&self) -> bool {
        self.intracellular_peak && self.extracellular_peak && self.final_recovery
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub strain: StrainKind,
    pub peak_glu_in_mM: f64,
    pub peak_glu_ext_mM: f64,
    pub time_of_peak_glu_in_h: f64,
    pub final_glu_in_mM: f64,
    pub final_glu_ext_mM: f64,
    /// Time with fold_GDH above the active threshold
    pub stimulus_duration_h: f64,
    pub targets: PerformanceTargets,
    /// First entry time of each regime, in order
    pub regime_entries: Vec<(f64, Regime)>,
}

impl PerformanceSummary {
    pub fn print_summary(&self) {
        println!("=== Strain Performance ({}) ===", self.strain.label());
        println!(
            "Glu_in:  peak {:.2} mM at {:.1} h, final {:.2} mM",
            self.peak_glu_in_mM, self.time_of_peak_glu_in_h, self.final_glu_in_mM
        );
        println!(
            "Glu_ext: peak {:.2} mM, final {:.2} mM",
            self.peak_glu_ext_mM, self.final_glu_ext_mM
        );
        println!("Induced (fold_GDH > threshold): {:.2} h", self.stimulus_duration_h);
        for (t, regime) in &self.regime_entries {
            println!("  {:>6.2} h -> {}", t, regime.label());
        }
        let mark = |ok: bool| if ok { "✓" } else { "⚠️" };
        println!("{} Intracellular peak >= 45 mM", mark(self.targets.intracellular_peak));
        println!("{} Extracellular peak >= 30 mM", mark(self.targets.extracellular_peak));
        println!("{} Final Glu_in within 20 ± 8 mM", mark(self.targets.final_recovery));
    }
}

/// Peaks, finals, induced duration and target checks of a strain run
pub fn analyze_performance(
    kind: StrainKind,
    schedule: &RegimeSchedule,
    traj: &Trajectory,
) -> Result<PerformanceSummary> {
    let fold = traj.column("fold_GDH")?;
    let indicator: Vec<f64> = fold
        .iter()
        .map(|&f| if regime::is_induced(schedule, f) { 1.0 } else { 0.0 })
        .collect();
    let regimes = regime::regime_timeline(schedule, traj)?;

    let peak_glu_in_mM = traj.max_of("Glu_in_mM")?;
    let peak_glu_ext_mM = traj.max_of("Glu_ext_mM")?;
    let final_glu_in_mM = traj.final_value("Glu_in_mM")?;

    Ok(PerformanceSummary {
        strain: kind,
        peak_glu_in_mM,
        peak_glu_ext_mM,
        time_of_peak_glu_in_h: traj.time_of_max("Glu_in_mM")?,
        final_glu_in_mM,
        final_glu_ext_mM: traj.final_value("Glu_ext_mM")?,
        stimulus_duration_h: stats::trapezoid(&indicator, &traj.t),
        targets: PerformanceTargets {
            intracellular_peak: peak_glu_in_mM >= 45.0,
            extracellular_peak: peak_glu_ext_mM >= 30.0,
            final_recovery: (final_glu_in_mM - 20.0).abs() <= 8.0,
        },
        regime_entries: regime::transitions(&traj.t, &regimes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_settings() -> SolverSettings {
        EngineeredStrain::default_solver()
    }

    #[test]
    fn test_wildtype_holds_glutamate() {
        let strain = EngineeredStrain::wildtype();
        let traj = strain
            .simulate(&Signal::heat_shock_protocol(), 24.0, 0.5, None, &short_settings())
            .unwrap();
        for v in traj.column("Glu_in_mM").unwrap() {
            assert!((v - 20.0).abs() < 1e-6, "Glu_in drifted to {}", v);
        }
        assert!(traj.max_of("Glu_ext_mM").unwrap().abs() < 1e-12);
        assert!((traj.max_of("fold_GDH").unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fold_tracks_induction() {
        let strain = EngineeredStrain::engineered();
        let p = &strain.params;
        let y = DEFAULT_INITIAL_STATE;
        let d = strain.derivative(9.0, &y, &Signal::constant(3000.0));
        let target = p.fold_target(3000.0, p.fold_GDH_max);
        assert!((d[FOLD_GDH] - (target - 1.0) / p.tau_enzyme_h).abs() < 1e-9);
        assert!(target > 1400.0);
    }

    #[test]
    fn test_secretion_rate_by_regime() {
        let p = StrainParameters::engineered();
        assert!((p.secretion_rate(Regime::Active, 30.0) - 0.04).abs() < 1e-12);
        assert!((p.secretion_rate(Regime::Recovery, 45.0) - 8.0).abs() < 1e-12);
        assert!((p.secretion_rate(Regime::Active, 60.0) - 8.0).abs() < 1e-12);
        assert!((p.secretion_rate(Regime::PreStimulus, 20.0) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_export_decay_after_stimulus() {
        let p = StrainParameters::engineered();
        assert_eq!(p.export_decay(Regime::PreStimulus, 5.0), 1.0);
        assert_eq!(p.export_decay(Regime::Active, 13.0), 1.0);
        let expected = (-0.8_f64).exp() * 0.5;
        assert!((p.export_decay(Regime::PostStimulusBuffer, 13.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_accumulation_only_while_active() {
        let p = StrainParameters::engineered();
        assert!((p.accumulation_drive(Regime::Active, 25.0) - 40.0).abs() < 1e-12);
        assert_eq!(p.accumulation_drive(Regime::Active, 60.0), 0.0);
        assert_eq!(p.accumulation_drive(Regime::Recovery, 25.0), 0.0);
        assert_eq!(p.homeostasis(Regime::Active, 40.0), 0.0);
        assert!((p.homeostasis(Regime::Recovery, 30.0) + 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_strain_labels() {
        assert_eq!(StrainKind::from_label("WT").unwrap(), StrainKind::Wildtype);
        assert_eq!(StrainKind::from_label("engineered").unwrap(), StrainKind::Engineered);
        assert!(StrainKind::from_label("mutant").is_err());
    }
}
