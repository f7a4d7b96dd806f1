//! Configuration and calibration artifacts.
//!
//! `CalibrationStore` holds named promoter and gate parameter sets produced by
//! the fitter. `ModelConfig` holds one parameter section per model and is read
//! from a JSON file of overrides.

mod calibration;
mod model_config;

pub use calibration::{
    CalibrationEntry, CalibrationStore, GateRecord, PromoterRecord, HEAT_PROMOTER,
    OXYGEN_PROMOTER, SPLIT_T7,
};
pub use model_config::{merge_json, ModelConfig};
