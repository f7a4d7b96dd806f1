//! Split-T7 reconstitution kinetics.
//!
//! Instead of the instantaneous binding rule, the active complex is tracked
//! explicitly:
//!
//! d[T7]/dt = k_a * A(t) * B(t) - (k_dis + k_deg) * [T7]
//!
//! so a change of environment reaches the gate output with a delay of order
//! 1/(k_dis + k_deg). Under a fixed environment the complex settles at
//! k_a * A * B / (k_dis + k_deg). With k_deg = 0 and k_a / k_dis = alpha / Kd
//! this is the unsaturated limit of the instantaneous rule.

use serde::{Deserialize, Serialize};

use super::gate::{ActivitySource, AndGate, EnvironmentSchedule, GateParameters};
use crate::error::Result;
use crate::numerics::signal::{Interpolation, Signal};
use crate::numerics::{integrate, stats, OdeSystem, SolverSettings, Trajectory};

/// Assembly and turnover rates of the split polymerase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicGateParameters {
    /// Association rate of the two halves (1/(AU*h))
    pub k_assembly: f64,
    /// Dissociation rate of the complex (1/h)
    pub k_disassembly: f64,
    /// Degradation/dilution of the complex (1/h)
    pub k_deg: f64,
    /// Simulation horizon (h)
    pub t_end_h: f64,
    /// Output sampling interval (h)
    pub dt_h: f64,
}

impl Default for DynamicGateParameters {
    fn default() -> Self {
        Self {
            k_assembly: 1e-6,
            k_disassembly: 1e-3,
            k_deg: 0.05,
            t_end_h: 24.0,
            dt_h: 0.1,
        }
    }
}

impl DynamicGateParameters {
    /// Complex level at equilibrium for fixed arm outputs
    pub fn steady_state(&self, a: f64, b: f64) -> f64 {
        self.k_assembly * a * b / (self.k_disassembly + self.k_deg)
    }

    /// Kinetics whose steady state matches `gate` below saturation
    ///
    /// Degradation is switched off and the assembly rate is set so that
    /// k_assembly / k_disassembly = alpha / Kd.
    pub fn matched_to(gate: &GateParameters, k_disassembly: f64) -> Self {
        Self {
            k_assembly: gate.alpha / gate.Kd * k_disassembly,
            k_disassembly,
            k_deg: 0.0,
            ..Self::default()
        }
    }

    /// Sample times 0, dt, ..., t_end
    pub fn time_grid(&self) -> Vec<f64> {
        let n = (self.t_end_h / self.dt_h).round() as usize + 1;
        stats::linspace(0.0, self.t_end_h, n.max(2))
    }
}

/// One-state ODE for the reconstituted complex
#[derive(Debug, Clone)]
pub struct DynamicGate {
    pub params: DynamicGateParameters,
    /// A*B as a function of time
    product: Signal,
}

impl DynamicGate {
    /// Resolve the arm product of `gate` under `schedule` once, up front
    pub fn new(gate: &AndGate, schedule: &EnvironmentSchedule, params: DynamicGateParameters) -> Result<Self> {
        let product = schedule.product_signal(gate, Interpolation::Linear)?;
        Ok(Self { params, product })
    }

    /// Drive the complex directly with an A*B signal
    pub fn from_product(product: Signal, params: DynamicGateParameters) -> Self {
        Self { params, product }
    }

    /// Integrate from an empty complex pool over the configured horizon
    pub fn simulate(&self, settings: &SolverSettings) -> Result<Trajectory> {
        integrate(self, &[0.0], &self.params.time_grid(), settings)
    }
}

/// Gate whose output lags the environment through reconstitution kinetics
///
/// Reported activity is the gate leak plus the complex level, so both gate
/// variants share units and the same baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstitutionGate {
    pub gate: AndGate,
    pub kinetics: DynamicGateParameters,
    pub solver: SolverSettings,
}

impl ReconstitutionGate {
    pub fn new(gate: AndGate, kinetics: DynamicGateParameters) -> Self {
        Self {
            gate,
            kinetics,
            solver: SolverSettings::default(),
        }
    }
}

impl ActivitySource for ReconstitutionGate {
    fn activity_signal(&self, env: &EnvironmentSchedule, t_end_h: f64) -> Result<Signal> {
        let kinetics = DynamicGateParameters {
            t_end_h: t_end_h.max(self.kinetics.t_end_h),
            ..self.kinetics.clone()
        };
        let dynamic = DynamicGate::new(&self.gate, env, kinetics)?;
        let traj = dynamic.simulate(&self.solver)?;
        let leaky = self.gate.gate.leaky;
        let values = traj
            .column("T7_active")?
            .into_iter()
            .map(|c| leaky + c)
            .collect();
        Signal::sampled(traj.t, values, Interpolation::Linear)
    }
}

impl OdeSystem for DynamicGate {
    fn ndim(&self) -> usize {
        1
    }

    fn state_names(&self) -> &'static [&'static str] {
        &["T7_active"]
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        let p = &self.params;
        dydt[0] = p.k_assembly * self.product.value_at(t) - (p.k_disassembly + p.k_deg) * y[0];
    }

    fn project(&self, y: &mut [f64]) {
        y[0] = y[0].max(0.0);
    }
}
