//! Whole-run parameter document.
//!
//! Every section defaults to the built-in parameter set of its model. A user
//! file only needs the keys it changes:
//!
//! ```json
//! { "therapy": { "k_ferroptosis_max_per_h": 5.0 }, "toxicity": { "caution_uM": 80.0 } }
//! ```
//!
//! The file is merged over the serialised defaults (objects recursively,
//! everything else replaced) and the result is deserialised, so a typo in a
//! value type is an error while an omitted key keeps its default. Selecting
//! another variant of a tagged section (`"model"`, `"method"`, `"kind"`)
//! starts that section from the variant's own defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::circuit::AndGate;
use crate::error::Result;
use crate::metabolism::{GluParameters, StrainParameters};
use crate::numerics::SolverSettings;
use crate::pk::{FluxOptions, NeurotoxScenario, PkParameters, ToxicityThresholds, TrapezoidFlux};
use crate::therapy::TherapyParameters;

use super::calibration::CalibrationStore;

/// One section per model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub and_gate: AndGate,
    pub glu_metabolism: GluParameters,
    pub engineered_strain: StrainParameters,
    pub therapy: TherapyParameters,
    /// Three-compartment PK, pessimistic exchange by default
    pub pk: PkParameters,
    pub secretion: TrapezoidFlux,
    pub flux: FluxOptions,
    pub toxicity: ToxicityThresholds,
    /// Solver for the gate, minimal metabolism, therapy and PK runs
    pub solver: SolverSettings,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            and_gate: AndGate::default(),
            glu_metabolism: GluParameters::default(),
            engineered_strain: StrainParameters::engineered(),
            therapy: TherapyParameters::default(),
            pk: PkParameters::worst_case(),
            secretion: TrapezoidFlux::default(),
            flux: FluxOptions::default(),
            toxicity: ToxicityThresholds::default(),
            solver: SolverSettings::default(),
        }
    }
}

/// Discriminator keys of the internally tagged enums in the document
const VARIANT_TAGS: [&str; 3] = ["model", "method", "kind"];

/// True when `overlay` names a different enum variant than `base`
///
/// Fields of one variant mean nothing to another, so such an object replaces
/// the base instead of being merged into it.
fn switches_variant(base: &Map<String, Value>, overlay: &Map<String, Value>) -> bool {
    VARIANT_TAGS.iter().any(|tag| match (base.get(*tag), overlay.get(*tag)) {
        (Some(Value::String(old)), Some(Value::String(new))) => old != new,
        _ => false,
    })
}

/// Merge `overlay` into `base`: objects key by key, anything else replaced
///
/// An object that switches a tagged variant is replaced whole.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map))
            if !switches_variant(base_map, &overlay_map) =>
        {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl ModelConfig {
    /// Defaults with `overrides` merged on top
    pub fn from_overrides(overrides: Value) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;
        merge_json(&mut merged, overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_overrides_str(json: &str) -> Result<Self> {
        Self::from_overrides(serde_json::from_str(json)?)
    }

    /// Defaults overridden by the JSON file at `path`
    ///
    /// A missing file keeps the defaults. A file that exists but does not
    /// parse, or produces invalid parameters, is an error.
    pub fn load_with_overrides<P: AsRef<Path>>(path: P) -> Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => {
                let config = Self::from_overrides_str(&contents)?;
                log::info!("Loaded model configuration from {:?}", path.as_ref());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "Model configuration {:?} not found, using built-in defaults",
                    path.as_ref()
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        log::info!("Saved model configuration to {:?}", path.as_ref());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.glu_metabolism.validate()?;
        self.engineered_strain.validate()?;
        self.therapy.validate()?;
        self.pk.validate()?;
        self.secretion.validate()?;
        self.toxicity.validate()?;
        Ok(())
    }

    /// Same configuration with the gate taken from a calibration store
    pub fn with_calibration(self, store: &CalibrationStore) -> Self {
        Self {
            and_gate: store.and_gate(),
            ..self
        }
    }

    /// Stand-alone exposure scenario built from the pk and secretion sections
    pub fn neurotox_scenario(&self) -> NeurotoxScenario {
        NeurotoxScenario {
            secretion: self.secretion.clone(),
            params: self.pk.clone(),
            ..NeurotoxScenario::worst_case()
        }
    }
}
