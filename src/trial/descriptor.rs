//! Trial Descriptor - one entry of a control sequence

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Annotation key for the subject's response value.
pub const RESPONSE_FIELD: &str = "rsp";
/// Annotation key for the measured reaction time (milliseconds).
pub const REACTION_TIME_FIELD: &str = "rt";
/// Annotation key for the computed response error.
pub const ERROR_FIELD: &str = "err";
/// Annotation key for the acceptance flag.
pub const ACCEPTED_FIELD: &str = "accept";

/// Trial Descriptor maps factor names to factor levels.
///
/// Factor values are the identity of a trial: two descriptors with the same
/// factors describe the same condition. Values added while the trial runs
/// (chained parameters, responses, errors) live in a separate annotation map
/// so the original condition can always be recovered with
/// [`TrialDescriptor::without_annotations`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrialDescriptor {
    factors: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, Value>,
}

impl TrialDescriptor {
    /// Create an empty descriptor (the degenerate zero-factor trial).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a descriptor from `(factor, level)` pairs.
    #[must_use]
    pub fn from_factors<K, V, I>(factors: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            factors: factors
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            annotations: BTreeMap::new(),
        }
    }

    /// Add or replace a factor level.
    #[must_use]
    pub fn with_factor(mut self, name: impl Into<String>, level: impl Into<Value>) -> Self {
        self.factors.insert(name.into(), level.into());
        self
    }

    /// Get a factor level by name.
    #[must_use]
    pub fn factor(&self, name: &str) -> Option<&Value> {
        self.factors.get(name)
    }

    /// All factor levels, ordered by factor name.
    #[must_use]
    pub const fn factors(&self) -> &BTreeMap<String, Value> {
        &self.factors
    }

    /// Get a runtime annotation by name.
    #[must_use]
    pub fn annotation(&self, name: &str) -> Option<&Value> {
        self.annotations.get(name)
    }

    /// All runtime annotations.
    #[must_use]
    pub const fn annotations(&self) -> &BTreeMap<String, Value> {
        &self.annotations
    }

    /// Look a field up in the annotations first, then in the factors.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.annotations
            .get(name)
            .or_else(|| self.factors.get(name))
    }

    /// Numeric view of [`TrialDescriptor::get`].
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Set a runtime annotation, replacing any previous value.
    pub fn annotate(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.annotations.insert(name.into(), value.into());
    }

    /// The condition this trial was generated from, with annotations dropped.
    #[must_use]
    pub fn without_annotations(&self) -> Self {
        Self {
            factors: self.factors.clone(),
            annotations: BTreeMap::new(),
        }
    }

    /// Whether the trial was accepted. `None` until it has been scored.
    #[must_use]
    pub fn accepted(&self) -> Option<bool> {
        self.annotation(ACCEPTED_FIELD).and_then(Value::as_bool)
    }

    /// Returns true if there are no factors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
