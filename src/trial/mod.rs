//! Trial data model
//!
//! A [`TrialDescriptor`] is a single control-sequence entry: a map from
//! factor names to levels, plus runtime annotations added when the trial is
//! presented and scored.
//!
//! ## Usage
//!
//! ```rust
//! use expctl::trial::{AcceptanceWindow, ResponseScoring, TrialDescriptor, TrialOutcome};
//!
//! let mut trial = TrialDescriptor::new()
//!     .with_factor("mode", "telephone")
//!     .with_factor("stim", "banana.png");
//! trial.annotate("hue", 45);
//!
//! let scoring = ResponseScoring::circular("hue", AcceptanceWindow::default());
//! let accepted = scoring.apply(&mut trial, &TrialOutcome::new(60.0, 900.0)).unwrap();
//! assert!(accepted);
//! ```

mod descriptor;
mod scoring;

pub use descriptor::{
    TrialDescriptor, ACCEPTED_FIELD, ERROR_FIELD, REACTION_TIME_FIELD, RESPONSE_FIELD,
};
pub use scoring::{circular_error, AcceptanceWindow, ResponseScoring, TrialOutcome, CIRCLE_UNITS};
