//! glufire - environment-gated glutamate therapy model
//!
//! An engineered bacterium senses hypoxia AND heat through a split-T7 gate,
//! overproduces glutamate, and kills tumour cells by ferroptosis. This crate
//! models the chain from promoter calibration to systemic neurotoxicity:
//!
//! - `circuit`: promoter fitting, the AND gate and its reconstitution kinetics
//! - `metabolism`: enzyme induction and glutamate production/export
//! - `therapy`: joint tumour / engineered-cell / glutamate dynamics
//! - `pk`: plasma exposure and neurotoxicity risk
//!
//! All models integrate through the shared solvers in `numerics`.

// Allow non-snake-case for unit suffixes in field names (mM, uM, C, L, etc.)
// This follows the project convention of including units in names.
#![allow(non_snake_case)]

pub mod circuit;
pub mod config;
pub mod error;
pub mod export;
pub mod metabolism;
pub mod numerics;
pub mod pk;
pub mod therapy;

pub use circuit::{
    fit_promoter, ActivitySource, AndGate, DoseResponse, EnvironmentSchedule, GateParameters, HillFit,
    HillParameters, PromoterMode,
};
pub use config::{CalibrationStore, ModelConfig};
pub use error::{GlufireError, Result};
pub use metabolism::{EngineeredStrain, GluMetabolism, GluParameters, StrainKind};
pub use numerics::{integrate, OdeSystem, Signal, SolverSettings, Trajectory};
pub use pk::{assess_risk, NeurotoxScenario, PkParameters, RiskReport, ToxicityThresholds};
pub use therapy::{TherapyModel, TherapyParameters};
