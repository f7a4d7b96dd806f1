//! Engineered-bacteria tumour therapy.
//!
//! Couples the AND gate, the minimal glutamate model and tumour /
//! engineered-cell populations into one ODE system, and compares a therapy
//! environment against a control.

pub mod comparison;
pub mod model;

pub use comparison::{
    compare_conditions, compare_default_conditions, run_scenario, ScenarioOutcome,
    TherapyComparison,
};
pub use model::{TherapyModel, TherapyParameters, MIN_VIABLE_CELLS, THERAPY_STATE_NAMES};
