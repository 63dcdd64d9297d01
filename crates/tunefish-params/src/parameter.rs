use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a parameter value is rendered at the engine boundary.
///
/// Engines expose both integer options (search margins, thresholds) and
/// fractional ones (time-management multipliers). The optimizer always works
/// in `f64`; the kind only controls rendering when a value is handed to the
/// engine or exported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Float,
    Int,
}

/// A single tunable: current value, box constraints, and a step size.
///
/// Invariant: `min <= value <= max` whenever a `Parameter` is observable.
/// The step size scales both the perturbation offset and the update applied
/// by the optimizer, so parameters with very different magnitudes can share
/// one gain schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    #[serde(default)]
    pub kind: ParameterKind,
}

impl Parameter {
    /// Clamps `value` into this parameter's bounds.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Renders `value` the way the engine expects this option.
    #[must_use]
    pub fn render(&self, value: f64) -> String {
        match self.kind {
            ParameterKind::Float => format!("{value}"),
            #[expect(clippy::cast_possible_truncation)]
            ParameterKind::Int => format!("{}", value.round() as i64),
        }
    }
}

/// An ordered set of named tunables.
///
/// Iteration order is the lexicographic name order of the underlying
/// `BTreeMap` and stays stable for the whole run, so a direction vector
/// drawn in one place always lines up with the same parameters elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    parameters: BTreeMap<String, Parameter>,
}

impl ParameterSet {
    #[must_use]
    pub fn new(parameters: BTreeMap<String, Parameter>) -> Self {
        Self { parameters }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Iterates parameters in stable name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(name, p)| (name.as_str(), p))
    }

    /// Current values keyed by name.
    #[must_use]
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.parameters
            .iter()
            .map(|(name, p)| (name.clone(), p.value))
            .collect()
    }

    /// Replaces values in place, clamping each into its parameter's bounds.
    /// Names not present in this set are ignored.
    pub fn apply_values(&mut self, values: &BTreeMap<String, f64>) {
        for (name, value) in values {
            if let Some(p) = self.parameters.get_mut(name) {
                p.value = p.clamp(*value);
            }
        }
    }

    /// Returns a copy of this set carrying the same bounds, steps, and kinds
    /// but with values replaced (and clamped) from `values`.
    ///
    /// This is how candidate configurations are materialized: the perturbed
    /// values live in a plain map, the bounds travel with the set.
    #[must_use]
    pub fn with_values(&self, values: &BTreeMap<String, f64>) -> Self {
        let mut set = self.clone();
        set.apply_values(values);
        set
    }

    /// `option.Name=value` override strings for the match runner's
    /// `-engine` block, in stable name order.
    #[must_use]
    pub fn engine_options(&self) -> Vec<String> {
        self.iter()
            .map(|(name, p)| format!("option.{name}={}", p.render(p.value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(value: f64, min: f64, max: f64) -> Parameter {
        Parameter {
            value,
            min,
            max,
            step: 1.0,
            kind: ParameterKind::Float,
        }
    }

    #[test]
    fn test_clamp_is_total_order_clamp() {
        let p = param(5.0, 0.0, 10.0);
        assert_eq!(p.clamp(-3.0), 0.0);
        assert_eq!(p.clamp(5.5), 5.5);
        assert_eq!(p.clamp(42.0), 10.0);
        assert_eq!(p.clamp(0.0), 0.0);
        assert_eq!(p.clamp(10.0), 10.0);
    }

    #[test]
    fn test_render_int_rounds() {
        let p = Parameter {
            kind: ParameterKind::Int,
            ..param(5.0, 0.0, 100.0)
        };
        assert_eq!(p.render(64.5), "65");
        assert_eq!(p.render(64.2), "64");
        assert_eq!(p.render(-15.7), "-16");
    }

    #[test]
    fn test_render_float_keeps_fraction() {
        let p = param(1.4, 1.1, 1.8);
        assert_eq!(p.render(1.4), "1.4");
    }

    #[test]
    fn test_with_values_clamps_into_bounds() {
        let set = ParameterSet::new(BTreeMap::from([
            ("alpha".to_owned(), param(5.0, 0.0, 10.0)),
            ("beta".to_owned(), param(2.0, -1.0, 1.0)),
        ]));
        let candidate = set.with_values(&BTreeMap::from([
            ("alpha".to_owned(), 12.0),
            ("beta".to_owned(), 0.5),
        ]));
        assert_eq!(candidate.get("alpha").unwrap().value, 10.0);
        assert_eq!(candidate.get("beta").unwrap().value, 0.5);
        // the original set is untouched
        assert_eq!(set.get("alpha").unwrap().value, 5.0);
    }

    #[test]
    fn test_engine_options_render_in_name_order() {
        let set = ParameterSet::new(BTreeMap::from([
            (
                "WhiteOptimism".to_owned(),
                Parameter {
                    kind: ParameterKind::Int,
                    ..param(20.0, 0.0, 40.0)
                },
            ),
            ("ComplexityMult".to_owned(), param(1.2, 1.0, 1.5)),
        ]));
        assert_eq!(
            set.engine_options(),
            vec![
                "option.ComplexityMult=1.2".to_owned(),
                "option.WhiteOptimism=20".to_owned(),
            ]
        );
    }
}
