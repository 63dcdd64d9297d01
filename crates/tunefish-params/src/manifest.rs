use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::parameter::{Parameter, ParameterKind, ParameterSet};

/// Declared schema for one tunable: default value, bounds, step size, and
/// rendering kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    #[serde(default)]
    pub kind: ParameterKind,
}

/// The tunable-parameter manifest.
///
/// Every parameter the tuner may touch is declared here once, by name, with
/// its bounds and step size. The engine's option table is expected to expose
/// the same names, so the manifest doubles as the contract between the tuner
/// and the engine build being tuned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterManifest {
    pub parameters: BTreeMap<String, ParameterSpec>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ManifestError {
    #[display("manifest declares no parameters")]
    Empty,
    #[display("parameter '{name}': min {min} is not below max {max}")]
    InvalidBounds { name: String, min: f64, max: f64 },
    #[display("parameter '{name}': step size {step} is not positive")]
    InvalidStep { name: String, step: f64 },
    #[display("parameter '{name}': default {default} is outside [{min}, {max}]")]
    DefaultOutOfBounds {
        name: String,
        default: f64,
        min: f64,
        max: f64,
    },
    #[display("parameter '{name}' is not declared in the manifest")]
    UnknownParameter { name: String },
}

impl ParameterManifest {
    /// Checks every declaration before any iteration runs.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.parameters.is_empty() {
            return Err(ManifestError::Empty);
        }
        for (name, spec) in &self.parameters {
            if !spec.min.is_finite() || !spec.max.is_finite() || spec.min >= spec.max {
                return Err(ManifestError::InvalidBounds {
                    name: name.clone(),
                    min: spec.min,
                    max: spec.max,
                });
            }
            if !spec.step.is_finite() || spec.step <= 0.0 {
                return Err(ManifestError::InvalidStep {
                    name: name.clone(),
                    step: spec.step,
                });
            }
            if spec.default < spec.min || spec.default > spec.max {
                return Err(ManifestError::DefaultOutOfBounds {
                    name: name.clone(),
                    default: spec.default,
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        Ok(())
    }

    /// Seeds a live parameter set from the declared defaults.
    #[must_use]
    pub fn parameter_set(&self) -> ParameterSet {
        let parameters = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    Parameter {
                        value: spec.default,
                        min: spec.min,
                        max: spec.max,
                        step: spec.step,
                        kind: spec.kind,
                    },
                )
            })
            .collect();
        ParameterSet::new(parameters)
    }

    /// Seeds a live parameter set from persisted values.
    ///
    /// Persisted values are clamped into the current bounds. A name missing
    /// from `values` falls back to its manifest default, so a manifest can
    /// grow new tunables between resumed chunks. A persisted name unknown to
    /// the manifest is rejected, which catches typos in hand-edited state
    /// files before they silently tune nothing.
    pub fn parameter_set_with_values(
        &self,
        values: &BTreeMap<String, f64>,
    ) -> Result<ParameterSet, ManifestError> {
        if let Some(name) = values.keys().find(|name| !self.parameters.contains_key(*name)) {
            return Err(ManifestError::UnknownParameter { name: name.clone() });
        }
        let mut set = self.parameter_set();
        set.apply_values(values);
        Ok(set)
    }
}
