//! Named calibration artifacts for the gate arms and the split polymerase.
//!
//! On disk a store is one flat JSON object per entry:
//!
//! ```json
//! {
//!   "pPept":   { "beta": 1200.0, "K": 5.0, "n": 2.0, "leaky": 50.0, "_mode": "rep", "_r_squared": 0.98 },
//!   "pLR":     { "beta": 1500.0, "K": 40.0, "n": 8.0, "leaky": 80.0, "_mode": "act" },
//!   "splitT7": { "alpha": 2500.0, "Kd": 200000.0, "leaky": 0.0 }
//! }
//! ```
//!
//! Keys with a leading underscore are metadata and never reach a model.
//! An entry with an `alpha` key is a gate, anything else is a promoter.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::circuit::{AndGate, GateFit, GateParameters, HillFit, HillParameters, PromoterMode};
use crate::error::{GlufireError, Result};

/// Entry name of the hypoxia promoter
pub const OXYGEN_PROMOTER: &str = "pPept";
/// Entry name of the heat promoter
pub const HEAT_PROMOTER: &str = "pLR";
/// Entry name of the split-T7 reconstitution parameters
pub const SPLIT_T7: &str = "splitT7";

/// Fitted promoter plus the quality metrics it was stored with
#[derive(Debug, Clone, PartialEq)]
pub struct PromoterRecord {
    pub params: HillParameters,
    pub r_squared: Option<f64>,
    pub aic: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateRecord {
    pub params: GateParameters,
    pub r_squared: Option<f64>,
}

/// One named entry of the store
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationEntry {
    Promoter(PromoterRecord),
    Gate(GateRecord),
}

fn number(map: &Map<String, Value>, entry: &str, key: &str) -> Result<f64> {
    map.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| GlufireError::invalid(format!("entry '{}' has no numeric '{}'", entry, key)))
}

fn optional_number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

/// Mode from whichever of `type`, `_mode` or `mode` is present
fn normalized_mode(map: &Map<String, Value>) -> PromoterMode {
    ["type", "_mode", "mode"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(PromoterMode::from_label)
        .unwrap_or(PromoterMode::Activating)
}

impl CalibrationEntry {
    fn from_value(name: &str, value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| GlufireError::invalid(format!("entry '{}' is not an object", name)))?;

        if map.contains_key("alpha") {
            return Ok(CalibrationEntry::Gate(GateRecord {
                params: GateParameters {
                    alpha: number(map, name, "alpha")?,
                    Kd: number(map, name, "Kd")?,
                    leaky: optional_number(map, "leaky").unwrap_or(0.0),
                },
                r_squared: optional_number(map, "_r_squared"),
            }));
        }

        Ok(CalibrationEntry::Promoter(PromoterRecord {
            params: HillParameters {
                beta: number(map, name, "beta")?,
                K: number(map, name, "K")?,
                n: number(map, name, "n")?,
                leaky: optional_number(map, "leaky").unwrap_or(0.0),
                mode: normalized_mode(map),
            },
            r_squared: optional_number(map, "_r_squared"),
            aic: optional_number(map, "_aic"),
        }))
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            CalibrationEntry::Promoter(rec) => {
                let p = &rec.params;
                map.insert("beta".into(), p.beta.into());
                map.insert("K".into(), p.K.into());
                map.insert("n".into(), p.n.into());
                map.insert("leaky".into(), p.leaky.into());
                map.insert("_mode".into(), p.mode.label().into());
                if let Some(aic) = rec.aic {
                    map.insert("_aic".into(), aic.into());
                }
                if let Some(r2) = rec.r_squared {
                    map.insert("_r_squared".into(), r2.into());
                }
            }
            CalibrationEntry::Gate(rec) => {
                let p = &rec.params;
                map.insert("alpha".into(), p.alpha.into());
                map.insert("Kd".into(), p.Kd.into());
                map.insert("leaky".into(), p.leaky.into());
                if let Some(r2) = rec.r_squared {
                    map.insert("_r_squared".into(), r2.into());
                }
            }
        }
        Value::Object(map)
    }
}

/// Name -> calibration entry, read-only while a simulation batch runs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationStore {
    entries: BTreeMap<String, CalibrationEntry>,
}

impl CalibrationStore {
    /// Built-in promoter and gate parameters under their standard names
    pub fn builtin() -> Self {
        let mut store = Self::default();
        store.insert_promoter(OXYGEN_PROMOTER, HillParameters::pept_oxygen());
        store.insert_promoter(HEAT_PROMOTER, HillParameters::lr_heat());
        store.insert_gate(SPLIT_T7, GateParameters::default());
        store
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let root = value
            .as_object()
            .ok_or_else(|| GlufireError::invalid("calibration file must hold a JSON object"))?;
        let mut entries = BTreeMap::new();
        for (name, entry) in root {
            if name.starts_with('_') {
                continue;
            }
            entries.insert(name.clone(), CalibrationEntry::from_value(name, entry)?);
        }
        Ok(Self { entries })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let store = Self::from_json_str(&contents)?;
        log::info!(
            "Loaded {} calibration entries from {:?}",
            store.len(),
            path.as_ref()
        );
        Ok(store)
    }

    /// Load a store, or fall back to [`CalibrationStore::builtin`]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(store) => {
                    log::info!("Loaded calibration from {:?}", path.as_ref());
                    store
                }
                Err(e) => {
                    log::warn!("Failed to parse calibration {:?}: {}, using built-in defaults", path.as_ref(), e);
                    Self::builtin()
                }
            },
            Err(_) => {
                log::warn!("Calibration file {:?} not found, using built-in defaults", path.as_ref());
                Self::builtin()
            }
        }
    }

    pub fn to_json_value(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.to_value()))
            .collect();
        Value::Object(map)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, &self.to_json_value())?;
        log::info!("Saved {} calibration entries to {:?}", self.len(), path.as_ref());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry(&self, name: &str) -> Option<&CalibrationEntry> {
        self.entries.get(name)
    }

    pub fn insert_promoter(&mut self, name: &str, params: HillParameters) {
        self.entries.insert(
            name.to_string(),
            CalibrationEntry::Promoter(PromoterRecord {
                params,
                r_squared: None,
                aic: None,
            }),
        );
    }

    /// Store a fit together with its R² and AIC
    pub fn insert_fit(&mut self, name: &str, fit: &HillFit) {
        self.entries.insert(
            name.to_string(),
            CalibrationEntry::Promoter(PromoterRecord {
                params: fit.params.clone(),
                r_squared: Some(fit.r_squared),
                aic: Some(fit.aic),
            }),
        );
    }

    pub fn insert_gate(&mut self, name: &str, params: GateParameters) {
        self.entries.insert(
            name.to_string(),
            CalibrationEntry::Gate(GateRecord {
                params,
                r_squared: None,
            }),
        );
    }

    pub fn insert_gate_fit(&mut self, name: &str, fit: &GateFit) {
        self.entries.insert(
            name.to_string(),
            CalibrationEntry::Gate(GateRecord {
                params: fit.params.clone(),
                r_squared: Some(fit.r_squared),
            }),
        );
    }

    /// # Errors
    /// `MissingParameter` if `name` is absent or holds gate parameters.
    pub fn get_promoter(&self, name: &str) -> Result<HillParameters> {
        match self.entries.get(name) {
            Some(CalibrationEntry::Promoter(rec)) => Ok(rec.params.clone()),
            _ => Err(GlufireError::MissingParameter(format!("promoter '{}'", name))),
        }
    }

    /// # Errors
    /// `MissingParameter` if `name` is absent or holds promoter parameters.
    pub fn get_gate(&self, name: &str) -> Result<GateParameters> {
        match self.entries.get(name) {
            Some(CalibrationEntry::Gate(rec)) => Ok(rec.params.clone()),
            _ => Err(GlufireError::MissingParameter(format!("gate '{}'", name))),
        }
    }

    /// Stored promoter, or the built-in one with a warning
    pub fn promoter_or_default(&self, name: &str) -> HillParameters {
        self.get_promoter(name).unwrap_or_else(|_| {
            let fallback = builtin_promoter(name);
            log::warn!(
                "No calibration for promoter '{}', falling back to built-in {} parameters",
                name,
                fallback.mode.label()
            );
            fallback
        })
    }

    pub fn gate_or_default(&self, name: &str) -> GateParameters {
        self.get_gate(name).unwrap_or_else(|_| {
            log::warn!("No calibration for gate '{}', falling back to built-in parameters", name);
            GateParameters::default()
        })
    }

    /// AND gate assembled from the standard entries
    pub fn and_gate(&self) -> AndGate {
        AndGate::from_promoters(
            self.promoter_or_default(OXYGEN_PROMOTER),
            self.promoter_or_default(HEAT_PROMOTER),
            self.gate_or_default(SPLIT_T7),
        )
    }
}

fn builtin_promoter(name: &str) -> HillParameters {
    if name == OXYGEN_PROMOTER {
        HillParameters::pept_oxygen()
    } else {
        HillParameters::lr_heat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_key_normalization() {
        let json = r#"{
            "a": {"beta": 10, "K": 1, "n": 2, "leaky": 0, "type": "rep"},
            "b": {"beta": 10, "K": 1, "n": 2, "_mode": "inhibitory"},
            "c": {"beta": 10, "K": 1, "n": 2, "mode": "act"},
            "d": {"beta": 10, "K": 1, "n": 2}
        }"#;
        let store = CalibrationStore::from_json_str(json).unwrap();
        assert_eq!(store.get_promoter("a").unwrap().mode, PromoterMode::Repressing);
        assert_eq!(store.get_promoter("b").unwrap().mode, PromoterMode::Repressing);
        assert_eq!(store.get_promoter("c").unwrap().mode, PromoterMode::Activating);
        assert_eq!(store.get_promoter("d").unwrap().mode, PromoterMode::Activating);
        assert_eq!(store.get_promoter("b").unwrap().leaky, 0.0);
    }

    #[test]
    fn test_gate_and_promoter_are_distinct() {
        let store = CalibrationStore::builtin();
        assert!(store.get_gate(SPLIT_T7).is_ok());
        assert!(matches!(
            store.get_promoter(SPLIT_T7),
            Err(GlufireError::MissingParameter(_))
        ));
        assert!(matches!(
            store.get_gate(OXYGEN_PROMOTER),
            Err(GlufireError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_metadata_keys_round_trip() {
        let mut store = CalibrationStore::default();
        let fit = HillFit {
            params: HillParameters::pept_oxygen(),
            r_squared: 0.97,
            aic: -12.5,
            rss: 1.0,
            iterations: 20,
        };
        store.insert_fit(OXYGEN_PROMOTER, &fit);
        let value = store.to_json_value();
        let entry = &value[OXYGEN_PROMOTER];
        assert_eq!(entry["_mode"], "rep");
        assert_eq!(entry["_aic"], -12.5);
        assert!(entry.get("mode").is_none());

        let reread = CalibrationStore::from_json_str(&value.to_string()).unwrap();
        assert_eq!(reread, store);
    }

    #[test]
    fn test_missing_numeric_is_rejected() {
        let json = r#"{"x": {"beta": 10, "n": 2}}"#;
        assert!(CalibrationStore::from_json_str(json).is_err());
        assert!(CalibrationStore::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn test_fallbacks() {
        let store = CalibrationStore::default();
        assert_eq!(store.promoter_or_default(OXYGEN_PROMOTER), HillParameters::pept_oxygen());
        assert_eq!(store.promoter_or_default(HEAT_PROMOTER), HillParameters::lr_heat());
        assert_eq!(store.and_gate(), AndGate::default());
    }
}
