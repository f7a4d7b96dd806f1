//! Environmental sensing circuit.
//!
//! Hypoxia (pPept) and heat (pL/pR) promoters each express half of a split
//! T7 RNA polymerase. The reconstituted polymerase is the AND-gated activity
//! that drives the glutamate pathway downstream.
//!
//! Submodules:
//! - `promoter`: Hill and thermal-switch transfer functions
//! - `gate`: instantaneous split-T7 binding, condition scans, schedules
//! - `dynamic_gate`: reconstitution kinetics as an ODE
//! - `fitting` / `lm`: calibration from dose-response data
//! - `synthetic`: reproducible noisy measurements

pub mod dynamic_gate;
pub mod fitting;
pub mod gate;
pub mod lm;
pub mod promoter;
pub mod synthetic;

pub use dynamic_gate::{DynamicGate, DynamicGateParameters, ReconstitutionGate};
pub use fitting::{
    fit_gate, fit_promoter, load_dose_response_csv, DoseResponse, FitMode, FitOptions, GateFit,
    HillFit,
};
pub use gate::{
    gate_activity, gate_activity_slice, ActivitySource, AndGate, ConditionPoint, EnvironmentSchedule,
    GateParameters, SafetyMetrics,
};
pub use promoter::{
    promoter_output, promoter_output_slice, HillParameters, PromoterMode, SensorModel,
    ThermalSwitchParameters,
};
