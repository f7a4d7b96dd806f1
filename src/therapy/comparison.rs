//! Therapy vs control scenario comparison.
//!
//! The two scenarios share one model and differ only in their environment.
//! Each is integrated on its own; a failure in one is kept as that side's
//! error and does not stop the other.

use serde::Serialize;

use super::model::TherapyModel;
use crate::circuit::EnvironmentSchedule;
use crate::error::Result;
use crate::numerics::{SolverSettings, Trajectory};

/// End-of-run readout of one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub label: String,
    /// Peak T7 activity of the scenario (AU)
    pub t7_activity_AU: f64,
    pub final_tumor_cells: f64,
    pub final_dead_cells: f64,
    pub final_engineered_cells: f64,
    pub final_glu_extra_mM: f64,
    pub peak_glu_extra_mM: f64,
    /// Ferroptotic death rate at the final extracellular glutamate (1/h)
    pub final_ferroptosis_rate_per_h: f64,
    #[serde(skip)]
    pub trajectory: Trajectory,
}

/// Paired therapy and control results
#[derive(Debug)]
pub struct TherapyComparison {
    pub therapy: Result<ScenarioOutcome>,
    pub control: Result<ScenarioOutcome>,
}

impl TherapyComparison {
    /// Final tumour count, therapy over control
    pub fn surviving_fraction_ratio(&self) -> Option<f64> {
        match (&self.therapy, &self.control) {
            (Ok(t), Ok(c)) if c.final_tumor_cells > 0.0 => {
                Some(t.final_tumor_cells / c.final_tumor_cells)
            }
            _ => None,
        }
    }

    /// Final extracellular glutamate, therapy over control
    pub fn glutamate_ratio(&self) -> Option<f64> {
        match (&self.therapy, &self.control) {
            (Ok(t), Ok(c)) => Some(t.final_glu_extra_mM / (c.final_glu_extra_mM + 1e-9)),
            _ => None,
        }
    }

    pub fn both_succeeded(&self) -> bool {
        self.therapy.is_ok() && self.control.is_ok()
    }

    pub fn print_summary(&self) {
        println!("=== Therapy vs Control ===");
        for side in [&self.therapy, &self.control] {
            match side {
                Ok(o) => {
                    println!("--- {} ---", o.label);
                    println!("  T7 activity:          {:.1} AU", o.t7_activity_AU);
                    println!("  Tumour cells (final): {:.3e}", o.final_tumor_cells);
                    println!("  Dead cells (final):   {:.3e}", o.final_dead_cells);
                    println!("  Engineered (final):   {:.3e}", o.final_engineered_cells);
                    println!(
                        "  Glu_extra:            {:.3} mM final, {:.3} mM peak",
                        o.final_glu_extra_mM, o.peak_glu_extra_mM
                    );
                    println!(
                        "  Ferroptosis rate:     {:.6} /h",
                        o.final_ferroptosis_rate_per_h
                    );
                }
                Err(e) => println!("⚠️ Scenario failed: {}", e),
            }
        }
        if let Some(ratio) = self.surviving_fraction_ratio() {
            let mark = if ratio < 1.0 { "✓" } else { "⚠️" };
            println!("{} Tumour survival (therapy/control): {:.3e}", mark, ratio);
        }
        if let Some(ratio) = self.glutamate_ratio() {
            println!("Glu_extra ratio (therapy/control): {:.1}", ratio);
        }
    }
}

/// Integrate one labelled scenario and collect its readout
pub fn run_scenario(
    model: &TherapyModel,
    label: &str,
    env: &EnvironmentSchedule,
    settings: &SolverSettings,
) -> Result<ScenarioOutcome> {
    log::info!("Running {} scenario", label);
    let t7 = model.activity_signal(env)?;
    let trajectory = model.simulate_with_signal(&t7, settings)?;
    let final_glu_extra_mM = trajectory.final_value("Glu_extra_mM")?;
    let outcome = ScenarioOutcome {
        label: label.to_string(),
        t7_activity_AU: t7.max_value(),
        final_tumor_cells: trajectory.final_value("N_tumor")?,
        final_dead_cells: trajectory.final_value("D_tumor")?,
        final_engineered_cells: trajectory.final_value("N_eng")?,
        final_glu_extra_mM,
        peak_glu_extra_mM: trajectory.max_of("Glu_extra_mM")?,
        final_ferroptosis_rate_per_h: model.params.ferroptosis_rate(final_glu_extra_mM),
        trajectory,
    };
    log::info!(
        "{} scenario finished: {:.3e} tumour cells",
        label,
        outcome.final_tumor_cells
    );
    Ok(outcome)
}

/// Run therapy and control environments independently
pub fn compare_conditions(
    model: &TherapyModel,
    therapy_env: &EnvironmentSchedule,
    control_env: &EnvironmentSchedule,
    settings: &SolverSettings,
) -> TherapyComparison {
    let therapy = run_scenario(model, "Therapy", therapy_env, settings);
    if let Err(e) = &therapy {
        log::warn!("Therapy scenario failed: {}", e);
    }
    let control = run_scenario(model, "Control", control_env, settings);
    if let Err(e) = &control {
        log::warn!("Control scenario failed: {}", e);
    }
    TherapyComparison { therapy, control }
}

/// Low-O2/high-T therapy against normoxic/normothermic control
pub fn compare_default_conditions(model: &TherapyModel, settings: &SolverSettings) -> TherapyComparison {
    compare_conditions(
        model,
        &EnvironmentSchedule::constant(1.0, 42.0),
        &EnvironmentSchedule::constant(21.0, 37.0),
        settings,
    )
}

impl ScenarioOutcome {
    /// Tumour cells killed as a fraction of all tumour cells ever present
    pub fn kill_fraction(&self) -> f64 {
        let total = self.final_tumor_cells + self.final_dead_cells;
        if total <= 0.0 {
            return 0.0;
        }
        self.final_dead_cells / total
    }
}
