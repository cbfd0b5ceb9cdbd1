//! Session Controller
//!
//! Drives one subject through one experiment: restores or creates the
//! session record, presents the head of the control sequence, records each
//! outcome, re-queues rejected trials, and saves after every step.
//!
//! ## State machine
//!
//! ```text
//! UNINITIALIZED ──open (store miss → generate)──> IN_PROGRESS
//! IN_PROGRESS   ──open (store hit, not done)────> IN_PROGRESS   (resume)
//! IN_PROGRESS   ──advance_trial─────────────────> IN_PROGRESS   (advance)
//! IN_PROGRESS   ──advance_trial, queue empty────> DONE
//! DONE          ──advance_trial─────────────────> Err(AlreadyComplete)
//! ```
//!
//! The trial being presented stays at the head of `remaining` until its
//! outcome arrives. An interrupted session therefore resumes on exactly the
//! trial that was on screen.
//!
//! ## Usage
//!
//! ```rust
//! use expctl::config::{Config, RunOptions};
//! use expctl::control::Design;
//! use expctl::controller::{Advance, SessionController};
//! use expctl::experiment::ExperimentDefinition;
//! use expctl::session::MemorySessionStore;
//! use expctl::trial::TrialOutcome;
//!
//! struct Demo;
//!
//! impl ExperimentDefinition for Demo {
//!     fn name(&self) -> &str {
//!         "demo"
//!     }
//!
//!     fn design(&self) -> Design {
//!         Design::builder(1).factor("condition", ["a", "b"]).build()
//!     }
//! }
//!
//! let mut options = RunOptions::new(&Config::default(), vec!["demo".into()]);
//! options.subject_id = "s01".into();
//!
//! let mut session = SessionController::open(MemorySessionStore::new(), Demo, &options).unwrap();
//! assert!(matches!(session.advance_trial(None).unwrap(), Advance::Next(_)));
//! assert!(matches!(
//!     session.advance_trial(Some(TrialOutcome::new(0.0, 500.0))).unwrap(),
//!     Advance::Next(_)
//! ));
//! assert!(matches!(
//!     session.advance_trial(Some(TrialOutcome::new(0.0, 500.0))).unwrap(),
//!     Advance::Done
//! ));
//! ```

mod chain;

pub use chain::{ChainRule, ParameterRange};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::config::RunOptions;
use crate::experiment::{ContentProvider, ExperimentDefinition, Instructions, Presenter};
use crate::session::{SessionRecord, SessionState, SessionStore};
use crate::trial::{ResponseScoring, TrialDescriptor, TrialOutcome, ERROR_FIELD};
use crate::{Error, Result};

/// Instruction keys tried, in order, for the end-of-session message.
const DONE_KEYS: [&str; 2] = ["done", "__done__"];

/// Message shown at the end when no instruction text is available.
const DEFAULT_DONE_MESSAGE: &str = "This part of the session is complete. Thank you!";

/// What to present after an `advance_trial` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Present this trial next
    Next(TrialDescriptor),
    /// The session is finished
    Done,
}

/// Event reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// The subject responded to the current trial
    Response {
        /// Response value
        value: f64,
        /// Reaction time in milliseconds
        elapsed_ms: f64,
    },
    /// A message was dismissed
    Continue,
}

/// Controller owning one in-memory session record.
pub struct SessionController<S, E, R = StdRng> {
    store: S,
    experiment: E,
    rng: R,
    record: SessionRecord,
    scoring: ResponseScoring,
    chain: Option<ChainRule>,
    instructions: Instructions,
}

impl<S, E> SessionController<S, E, StdRng>
where
    S: SessionStore,
    E: ExperimentDefinition,
{
    /// Open a session with an entropy-seeded RNG.
    ///
    /// # Errors
    ///
    /// See [`SessionController::open_with_rng`].
    pub fn open(store: S, experiment: E, options: &RunOptions) -> Result<Self> {
        Self::open_with_rng(store, experiment, options, StdRng::from_entropy())
    }
}

impl<S, E, R> SessionController<S, E, R>
where
    S: SessionStore,
    E: ExperimentDefinition,
    R: Rng,
{
    /// Resume the subject's saved session, or create one with a freshly
    /// generated control sequence.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::CorruptRecord`] and [`Error::Io`] from the store
    /// and [`Error::InvalidDesign`] from sequence generation.
    pub fn open_with_rng(store: S, experiment: E, options: &RunOptions, mut rng: R) -> Result<Self> {
        let name = experiment.name().to_string();

        let mut record = match store.load(&options.subject_id, &name) {
            Ok(mut record) => {
                info!(
                    subject = %options.subject_id,
                    experiment = %name,
                    remaining = record.remaining().len(),
                    completed = record.completed().len(),
                    done = record.is_done(),
                    "resuming session"
                );
                record.push_log("resumed");
                record
            }
            Err(e) if e.is_not_found() => {
                info!(subject = %options.subject_id, experiment = %name, "new session");
                let mut builder = SessionRecord::builder(&options.subject_id, &name)
                    .user_id(&options.user_id)
                    .language(&options.language);
                if let Some(project) = &options.project_id {
                    builder = builder.project_id(project);
                }
                let mut record = builder.build();
                record.push_log("created");
                record
            }
            Err(e) => return Err(e),
        };

        if record.state() == SessionState::Uninitialized {
            let sequence = experiment.generate_initial_sequence(&mut rng)?;
            info!(trials = sequence.len(), "generated control sequence");
            record.set_remaining(sequence);
            if record.remaining().is_empty() {
                warn!(experiment = %name, "control sequence is empty, session is complete");
                record.mark_done();
                record.push_log("done (empty control sequence)");
            }
            record.touch();
            store.save(&record)?;
        }

        Ok(Self {
            scoring: experiment.scoring(),
            chain: experiment.chain_rule(),
            store,
            experiment,
            rng,
            record,
            instructions: Instructions::new(),
        })
    }

    /// Fetch instructions and run the experiment's setup hook.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Content`] from the provider.
    pub fn begin(
        &mut self,
        content: &dyn ContentProvider,
        presenter: &mut dyn Presenter,
    ) -> Result<()> {
        let language = self.record.language().unwrap_or("EN").to_string();
        self.instructions = content.get_instructions(self.record.experiment(), &language)?;
        self.experiment
            .on_setup(&self.record, &self.instructions, presenter);
        Ok(())
    }

    /// Record the outcome of the current trial (if any) and move on.
    ///
    /// With an outcome, the head trial is scored and appended to the
    /// completed list. A rejected trial goes back into the queue in its
    /// original form and the queue is reshuffled, so it recurs later in
    /// random order until it is accepted. Without an outcome the current
    /// trial is simply returned again.
    ///
    /// The step is applied to a copy of the record, which replaces the
    /// in-memory record only once it has been saved. A failed call leaves
    /// the session exactly as it was, so the same call can be retried.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyComplete`] if the session is done
    /// - [`Error::InvalidTrial`] if the outcome is not finite or scoring
    ///   cannot read the trial's target
    /// - any store error from saving
    pub fn advance_trial(&mut self, outcome: Option<TrialOutcome>) -> Result<Advance> {
        if self.record.is_done() {
            return Err(Error::AlreadyComplete {
                subject_id: self.record.subject_id().to_string(),
                experiment: self.record.experiment().to_string(),
            });
        }

        let mut draft = self.record.clone();
        if let Some(outcome) = outcome {
            self.record_outcome(&mut draft, &outcome)?;
        }

        let advance = if draft.remaining().is_empty() {
            draft.mark_done();
            draft.push_log("done");
            Advance::Done
        } else {
            let next = self.prepare_head(&mut draft);
            draft.mark_started();
            Advance::Next(next)
        };
        draft.touch();

        if let Err(e) = self.store.save(&draft) {
            warn!(
                subject = draft.subject_id(),
                experiment = draft.experiment(),
                error = %e,
                "save failed, session left at previous step"
            );
            return Err(e);
        }
        self.record = draft;

        if advance == Advance::Done {
            info!(
                subject = self.record.subject_id(),
                experiment = self.record.experiment(),
                completed = self.record.completed().len(),
                "session complete"
            );
        }
        Ok(advance)
    }

    /// Dispatch a presentation event and show whatever comes next.
    ///
    /// # Errors
    ///
    /// See [`SessionController::advance_trial`].
    pub fn handle_event(
        &mut self,
        event: SessionEvent,
        presenter: &mut dyn Presenter,
    ) -> Result<Advance> {
        let advance = match event {
            SessionEvent::Response { value, elapsed_ms } => {
                self.advance_trial(Some(TrialOutcome::new(value, elapsed_ms)))?
            }
            SessionEvent::Continue => self.advance_trial(None)?,
        };

        match &advance {
            Advance::Next(trial) => presenter.show_trial(trial),
            Advance::Done => presenter.show_message(self.done_message()),
        }
        Ok(advance)
    }

    /// Shorthand for a `Response` event.
    ///
    /// # Errors
    ///
    /// See [`SessionController::advance_trial`].
    pub fn on_response(
        &mut self,
        value: f64,
        elapsed_ms: f64,
        presenter: &mut dyn Presenter,
    ) -> Result<Advance> {
        self.handle_event(SessionEvent::Response { value, elapsed_ms }, presenter)
    }

    /// Shorthand for a `Continue` event.
    ///
    /// # Errors
    ///
    /// See [`SessionController::advance_trial`].
    pub fn on_continue(&mut self, presenter: &mut dyn Presenter) -> Result<Advance> {
        self.handle_event(SessionEvent::Continue, presenter)
    }

    /// The session record as it stands.
    #[must_use]
    pub const fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.record.state()
    }

    /// Trial at the head of the queue, if any.
    #[must_use]
    pub fn current_trial(&self) -> Option<&TrialDescriptor> {
        self.record.remaining().front()
    }

    /// Instructions fetched by [`SessionController::begin`].
    #[must_use]
    pub const fn instructions(&self) -> &Instructions {
        &self.instructions
    }

    /// The experiment being run.
    #[must_use]
    pub const fn experiment(&self) -> &E {
        &self.experiment
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Give up the controller, returning the final record.
    #[must_use]
    pub fn into_record(self) -> SessionRecord {
        self.record
    }

    fn record_outcome(&mut self, draft: &mut SessionRecord, outcome: &TrialOutcome) -> Result<()> {
        let Some(mut finished) = draft.remaining_mut().pop_front() else {
            return Err(Error::InvalidTrial("no trial in progress".into()));
        };

        let accepted = self.scoring.apply(&mut finished, outcome)?;

        info!(
            subject = draft.subject_id(),
            experiment = draft.experiment(),
            accepted,
            rsp = outcome.response,
            rt_ms = outcome.reaction_time_ms,
            err = finished.get_f64(ERROR_FIELD),
            "trial recorded"
        );

        let original = finished.without_annotations();
        draft.push_completed(finished);

        if accepted {
            draft.push_log("trial accepted");
        } else {
            let remaining = draft.remaining_mut();
            remaining.push_back(original);
            remaining.make_contiguous().shuffle(&mut self.rng);
            draft.push_log("trial rejected, re-queued");
        }
        Ok(())
    }

    /// Resolve runtime parameters of the head trial and return a copy.
    ///
    /// A chained parameter that is missing or not numeric is resolved again.
    fn prepare_head(&mut self, draft: &mut SessionRecord) -> TrialDescriptor {
        if let Some(rule) = &self.chain {
            let parameter = draft.remaining().front().and_then(|head| {
                head.annotation(&rule.parameter_field)
                    .and_then(serde_json::Value::as_f64)
                    .is_none()
                    .then(|| rule.resolve(head, draft.completed(), &mut self.rng))
            });
            if let (Some(value), Some(head)) = (parameter, draft.remaining_mut().front_mut()) {
                head.annotate(rule.parameter_field.clone(), value);
            }
        }

        match draft.remaining_mut().front_mut() {
            Some(head) => {
                self.experiment.on_trial(head, &mut self.rng);
                head.clone()
            }
            None => TrialDescriptor::new(),
        }
    }

    fn done_message(&self) -> &str {
        DONE_KEYS
            .iter()
            .find_map(|key| self.instructions.get(*key))
            .map_or(DEFAULT_DONE_MESSAGE, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::control::Design;
    use crate::session::MemorySessionStore;
    use crate::trial::AcceptanceWindow;

    struct TwoByTwo;

    impl ExperimentDefinition for TwoByTwo {
        fn name(&self) -> &str {
            "two-by-two"
        }

        fn design(&self) -> Design {
            Design::builder(1)
                .factor("a", [1, 2])
                .factor("b", ["x", "y"])
                .build()
        }

        fn scoring(&self) -> ResponseScoring {
            ResponseScoring::timing_only(AcceptanceWindow::new(f64::INFINITY, 300.0, 5000.0))
        }
    }

    fn options(subject: &str) -> RunOptions {
        let mut options = RunOptions::new(&Config::default(), vec!["two-by-two".into()]);
        options.subject_id = subject.to_string();
        options
    }

    fn open(subject: &str) -> SessionController<MemorySessionStore, TwoByTwo> {
        SessionController::open_with_rng(
            MemorySessionStore::new(),
            TwoByTwo,
            &options(subject),
            StdRng::seed_from_u64(11),
        )
        .unwrap()
    }

    #[test]
    fn test_open_generates_and_saves() {
        let session = open("s01");
        assert_eq!(session.state(), SessionState::InProgress);
        assert_eq!(session.record().remaining().len(), 4);
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn test_continue_returns_same_head() {
        let mut session = open("s01");
        let first = session.advance_trial(None).unwrap();
        let again = session.advance_trial(None).unwrap();
        assert_eq!(first, again);
        assert_eq!(session.record().remaining().len(), 4);
        assert!(session.record().started_at().is_some());
    }

    #[test]
    fn test_accepted_shrinks_queue() {
        let mut session = open("s01");
        session.advance_trial(None).unwrap();
        session
            .advance_trial(Some(TrialOutcome::new(0.0, 600.0)))
            .unwrap();
        assert_eq!(session.record().remaining().len(), 3);
        assert_eq!(session.record().completed().len(), 1);
    }

    #[test]
    fn test_rejected_keeps_queue_length() {
        let mut session = open("s01");
        session.advance_trial(None).unwrap();
        session
            .advance_trial(Some(TrialOutcome::new(0.0, 100.0)))
            .unwrap();
        assert_eq!(session.record().remaining().len(), 4);
        assert_eq!(session.record().completed()[0].accepted(), Some(false));
        assert!(session
            .record()
            .remaining()
            .iter()
            .all(|t| t.annotations().is_empty()));
    }

    #[test]
    fn test_already_complete() {
        let mut session = open("s01");
        let outcome = Some(TrialOutcome::new(0.0, 600.0));
        let mut calls = 0;
        loop {
            calls += 1;
            if session.advance_trial(outcome).unwrap() == Advance::Done {
                break;
            }
        }
        assert_eq!(calls, 4);
        assert_eq!(session.state(), SessionState::Done);
        assert!(matches!(
            session.advance_trial(None),
            Err(Error::AlreadyComplete { .. })
        ));
    }

    #[test]
    fn test_done_message_fallback() {
        let session = open("s01");
        assert_eq!(session.done_message(), DEFAULT_DONE_MESSAGE);
    }
}
