//! Glutamate overproduction downstream of the T7 gate.
//!
//! Two models at different resolution:
//! - `minimal`: enzyme induction and glutamate export, 4 states
//! - `strain`: central metabolism with biomass, cofactors and a regime FSM, 10 states
//!
//! Both take the gate output as a [`Signal`](crate::numerics::Signal).

pub mod minimal;
pub mod regime;
pub mod strain;

pub use minimal::{
    compare_activity_levels, ActivityComparison, ActivityRun, GluMetabolism, GluParameters,
    VolumeCoupling, GLU_STATE_NAMES,
};
pub use regime::{classify, Regime, RegimeSchedule};
pub use strain::{
    analyze_performance, EngineeredStrain, PerformanceSummary, PerformanceTargets, StrainKind,
    StrainParameters, STRAIN_STATE_NAMES,
};

/// Read-only view of the number of glutamate-producing cells
///
/// The extracellular volume correction of the glutamate model asks for the
/// current producer count at every derivative evaluation, so a population
/// model can supply it from its own state.
pub trait ProducerPopulation {
    /// Producer cells for the state `y` of the implementing system
    fn producer_count(&self, y: &[f64]) -> f64;
}
