//! Experiment capability interfaces
//!
//! The session controller never talks to a GUI toolkit directly. It is
//! given three collaborators:
//!
//! - [`ExperimentDefinition`]: what a concrete experiment contributes (its
//!   design, scoring, chaining, and setup/trial hooks)
//! - [`Presenter`]: the rendering layer that shows trials and messages
//! - [`ContentProvider`]: instruction text keyed by experiment and language

mod content;

pub use content::{ContentProvider, FsContentProvider, Instructions, GENERAL_SECTION};

use rand::RngCore;

use crate::control::Design;
use crate::controller::ChainRule;
use crate::session::SessionRecord;
use crate::trial::{ResponseScoring, TrialDescriptor};
use crate::Result;

/// Instruction key shown by the default setup hook.
pub const INTRO_KEY: &str = "intro";

/// Rendering collaborator. Implementations report back to the controller
/// through [`crate::controller::SessionController::handle_event`].
pub trait Presenter {
    /// Present a trial. The adapter reports `Response` when the subject
    /// answers.
    fn show_trial(&mut self, trial: &TrialDescriptor);

    /// Show a message. The adapter reports `Continue` when dismissed.
    fn show_message(&mut self, content: &str);
}

/// Everything a concrete experiment contributes to a session.
pub trait ExperimentDefinition {
    /// Experiment name; half of the session identity.
    fn name(&self) -> &str;

    /// Factorial design the control sequence is generated from.
    fn design(&self) -> Design;

    /// Build the control sequence for a subject meeting this experiment for
    /// the first time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidDesign`] if the design is unusable.
    fn generate_initial_sequence(&self, rng: &mut dyn RngCore) -> Result<Vec<TrialDescriptor>> {
        self.design().generate(rng)
    }

    /// How responses are scored. Defaults to accepting everything.
    fn scoring(&self) -> ResponseScoring {
        ResponseScoring::default()
    }

    /// Adaptive chaining rule, if the design uses one.
    fn chain_rule(&self) -> Option<ChainRule> {
        None
    }

    /// Called once when a session begins or resumes. Shows the `intro`
    /// instructions if there are any.
    fn on_setup(
        &mut self,
        _session: &SessionRecord,
        instructions: &Instructions,
        presenter: &mut dyn Presenter,
    ) {
        if let Some(intro) = instructions.get(INTRO_KEY) {
            presenter.show_message(intro);
        }
    }

    /// Called each time a trial is about to be presented, after chained
    /// parameters have been resolved. May add runtime annotations.
    fn on_trial(&mut self, _trial: &mut TrialDescriptor, _rng: &mut dyn RngCore) {}
}
