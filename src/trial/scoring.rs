//! Response scoring: circular error and acceptance windows

use serde::{Deserialize, Serialize};

use super::descriptor::{
    TrialDescriptor, ACCEPTED_FIELD, ERROR_FIELD, REACTION_TIME_FIELD, RESPONSE_FIELD,
};
use crate::{Error, Result};

/// Size of the circular response space (degrees on a colour wheel).
pub const CIRCLE_UNITS: f64 = 360.0;

/// Distance between `response` and `target` on a 360-unit circle.
///
/// Takes the shorter of the direct and the wrap-around difference, so the
/// result always lies in `[0, 180]` and is unchanged when either argument is
/// shifted by a whole turn.
///
/// ```rust
/// use expctl::trial::circular_error;
///
/// assert_eq!(circular_error(350.0, 10.0), 20.0);
/// assert_eq!(circular_error(10.0, 370.0), 0.0);
/// ```
#[must_use]
pub fn circular_error(response: f64, target: f64) -> f64 {
    let diff = (response - target).rem_euclid(CIRCLE_UNITS);
    diff.min(CIRCLE_UNITS - diff)
}

/// Measured result of a single trial, reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Response value (e.g. dial position in degrees)
    pub response: f64,
    /// Reaction time in milliseconds
    pub reaction_time_ms: f64,
}

impl TrialOutcome {
    /// Create a new outcome.
    #[must_use]
    pub const fn new(response: f64, reaction_time_ms: f64) -> Self {
        Self {
            response,
            reaction_time_ms,
        }
    }
}

/// Joint error-magnitude and reaction-time bounds. All bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceWindow {
    /// Errors must be strictly below this bound
    pub max_error: f64,
    /// Reaction times must be strictly above this bound
    pub min_reaction_ms: f64,
    /// Reaction times must be strictly below this bound
    pub max_reaction_ms: f64,
}

impl AcceptanceWindow {
    /// Create a window from explicit bounds.
    #[must_use]
    pub const fn new(max_error: f64, min_reaction_ms: f64, max_reaction_ms: f64) -> Self {
        Self {
            max_error,
            min_reaction_ms,
            max_reaction_ms,
        }
    }

    /// A window that accepts every finite response.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Check a scored response against the window.
    ///
    /// A missing error (no target to compare against) only checks timing.
    #[must_use]
    pub fn accepts(&self, error: Option<f64>, reaction_time_ms: f64) -> bool {
        let error_ok = error.map_or(true, |e| e < self.max_error);
        let rt_ok = self.min_reaction_ms < reaction_time_ms && reaction_time_ms < self.max_reaction_ms;
        error_ok && rt_ok
    }
}

impl Default for AcceptanceWindow {
    /// 40 units of error, 300-5000 ms reaction time.
    fn default() -> Self {
        Self::new(40.0, 300.0, 5000.0)
    }
}

/// How a finished trial is validated and annotated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseScoring {
    /// Field holding the target value the response is compared to. `None`
    /// scores on reaction time only.
    pub target_field: Option<String>,
    /// Acceptance bounds
    pub window: AcceptanceWindow,
}

impl ResponseScoring {
    /// Score responses against `target_field` on the circle.
    #[must_use]
    pub fn circular(target_field: impl Into<String>, window: AcceptanceWindow) -> Self {
        Self {
            target_field: Some(target_field.into()),
            window,
        }
    }

    /// Score on reaction time alone.
    #[must_use]
    pub const fn timing_only(window: AcceptanceWindow) -> Self {
        Self {
            target_field: None,
            window,
        }
    }

    /// Annotate `trial` with the response, reaction time, error and
    /// acceptance flag. Returns whether the trial was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTrial`] if the outcome is not finite, or if
    /// the target field is configured but missing from the trial or not
    /// numeric. The trial is left untouched in both cases.
    pub fn apply(&self, trial: &mut TrialDescriptor, outcome: &TrialOutcome) -> Result<bool> {
        if !outcome.response.is_finite() || !outcome.reaction_time_ms.is_finite() {
            return Err(Error::InvalidTrial(format!(
                "non-finite outcome (response {}, reaction time {} ms)",
                outcome.response, outcome.reaction_time_ms
            )));
        }

        let error = match &self.target_field {
            Some(field) => {
                let target = trial.get_f64(field).ok_or_else(|| {
                    Error::InvalidTrial(format!(
                        "target field '{field}' missing or not numeric in {:?}",
                        trial.factors()
                    ))
                })?;
                Some(circular_error(outcome.response, target))
            }
            None => None,
        };
        let accepted = self.window.accepts(error, outcome.reaction_time_ms);

        trial.annotate(RESPONSE_FIELD, outcome.response);
        trial.annotate(REACTION_TIME_FIELD, outcome.reaction_time_ms);
        if let Some(error) = error {
            trial.annotate(ERROR_FIELD, error);
        }
        trial.annotate(ACCEPTED_FIELD, accepted);

        Ok(accepted)
    }
}

impl Default for ResponseScoring {
    fn default() -> Self {
        Self::timing_only(AcceptanceWindow::unbounded())
    }
}
