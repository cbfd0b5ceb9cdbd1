//! Adaptive chaining ("telephone" designs)
//!
//! In a chained design each adaptive trial takes its input parameter from
//! the most recent completed trial in the same chain: same stimulus, same
//! chain key. The first trial of a chain, and every non-adaptive trial,
//! draws a fresh value from the full parameter range.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::trial::{TrialDescriptor, RESPONSE_FIELD};

/// Half-open integer range `[min, max)` that fresh parameters are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRange {
    /// Inclusive lower bound
    pub min: i64,
    /// Exclusive upper bound
    pub max: i64,
}

impl ParameterRange {
    /// Create a range. Bounds are swapped if given in the wrong order.
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A full turn of the colour wheel, `[0, 360)`.
    #[must_use]
    pub const fn degrees() -> Self {
        Self::new(0, 360)
    }

    /// Draw a value. An empty range always yields `min`.
    #[must_use]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..self.max)
        }
    }
}

/// Which trials chain together and which field carries the value forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRule {
    /// Factor selecting between adaptive and random trials
    pub mode_factor: String,
    /// Level of `mode_factor` that marks a trial as adaptive
    pub adaptive_level: Value,
    /// Factor naming the stimulus
    pub stimulus_factor: String,
    /// Factor naming the chain within a stimulus
    pub chain_factor: String,
    /// Field of the previous trial reused as the new parameter
    pub source_field: String,
    /// Annotation the resolved parameter is written to
    pub parameter_field: String,
    /// Range fresh values are drawn from
    pub range: ParameterRange,
    /// Only chain from accepted trials
    pub accepted_only: bool,
}

impl ChainRule {
    /// Chain on `mode = "telephone"`, `stim`, and `chain`, carrying the
    /// previous response into `parameter_field`.
    #[must_use]
    pub fn new(parameter_field: impl Into<String>, range: ParameterRange) -> Self {
        Self {
            mode_factor: "mode".to_string(),
            adaptive_level: Value::from("telephone"),
            stimulus_factor: "stim".to_string(),
            chain_factor: "chain".to_string(),
            source_field: RESPONSE_FIELD.to_string(),
            parameter_field: parameter_field.into(),
            range,
            accepted_only: false,
        }
    }

    /// Set the mode factor and its adaptive level.
    #[must_use]
    pub fn mode(mut self, factor: impl Into<String>, adaptive_level: impl Into<Value>) -> Self {
        self.mode_factor = factor.into();
        self.adaptive_level = adaptive_level.into();
        self
    }

    /// Set the stimulus factor.
    #[must_use]
    pub fn stimulus_factor(mut self, factor: impl Into<String>) -> Self {
        self.stimulus_factor = factor.into();
        self
    }

    /// Set the chain factor.
    #[must_use]
    pub fn chain_factor(mut self, factor: impl Into<String>) -> Self {
        self.chain_factor = factor.into();
        self
    }

    /// Set the field carried forward from the previous trial.
    #[must_use]
    pub fn source_field(mut self, field: impl Into<String>) -> Self {
        self.source_field = field.into();
        self
    }

    /// Restrict chaining to accepted trials.
    #[must_use]
    pub const fn accepted_only(mut self, accepted_only: bool) -> Self {
        self.accepted_only = accepted_only;
        self
    }

    /// True if `trial` takes its parameter from its chain.
    #[must_use]
    pub fn is_adaptive(&self, trial: &TrialDescriptor) -> bool {
        trial.factor(&self.mode_factor) == Some(&self.adaptive_level)
    }

    /// Most recent completed trial in the same chain as `trial`.
    ///
    /// A missing stimulus or chain factor only matches trials that lack it
    /// too.
    #[must_use]
    pub fn find_previous<'a>(
        &self,
        trial: &TrialDescriptor,
        completed: &'a [TrialDescriptor],
    ) -> Option<&'a TrialDescriptor> {
        let stimulus = trial.factor(&self.stimulus_factor);
        let chain = trial.factor(&self.chain_factor);

        completed.iter().rev().find(|prior| {
            self.is_adaptive(prior)
                && prior.factor(&self.stimulus_factor) == stimulus
                && prior.factor(&self.chain_factor) == chain
                && (!self.accepted_only || prior.accepted() == Some(true))
        })
    }

    /// Parameter value for `trial`: the chained value if there is a numeric
    /// one, otherwise a fresh draw.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        trial: &TrialDescriptor,
        completed: &[TrialDescriptor],
        rng: &mut R,
    ) -> Value {
        let chained = if self.is_adaptive(trial) {
            self.find_previous(trial, completed)
                .and_then(|prior| prior.get(&self.source_field))
                .filter(|value| value.as_f64().is_some())
                .cloned()
        } else {
            None
        };

        chained.unwrap_or_else(|| Value::from(self.range.draw(rng)))
    }
}
