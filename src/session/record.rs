//! Session Record - one subject's progress through one experiment

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trial::TrialDescriptor;

/// Lifecycle state derived from a record's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No control sequence has been generated yet.
    Uninitialized,
    /// Trials remain to be run.
    InProgress,
    /// Every trial has been completed and accepted.
    Done,
}

/// Timestamped line in a record's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was written
    pub at: DateTime<Utc>,
    /// What happened
    pub message: String,
}

/// Session Record represents one subject's run of one experiment.
///
/// The pair (`subject_id`, `experiment`) is the record's identity. The
/// head of `remaining` is the trial currently being presented; it leaves the
/// queue only once its outcome has been recorded, so a saved record is
/// always an exact resume point.
///
/// ## Invariant
///
/// `remaining` is empty if and only if the session is done or was never
/// started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    subject_id: String,
    experiment: String,
    project_id: Option<String>,
    user_id: String,
    language: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    remaining: VecDeque<TrialDescriptor>,
    completed: Vec<TrialDescriptor>,
    done: bool,
    log: Vec<LogEntry>,
}

impl SessionRecord {
    /// Create an empty record for a subject and experiment.
    ///
    /// The user ID is left as `"unknown"`; use the builder to set it.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, experiment: impl Into<String>) -> Self {
        Self::builder(subject_id, experiment).build()
    }

    /// Create a builder for constructing a record with optional fields.
    #[must_use]
    pub fn builder(
        subject_id: impl Into<String>,
        experiment: impl Into<String>,
    ) -> SessionRecordBuilder {
        SessionRecordBuilder::new(subject_id, experiment)
    }

    /// Get the subject ID.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Get the project ID, if any.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Get the experimenter/user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Get the testing language, if recorded.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the last-updated timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Get the time the first trial was presented.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the time the session finished.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Trials still to run; the head is the current trial.
    #[must_use]
    pub const fn remaining(&self) -> &VecDeque<TrialDescriptor> {
        &self.remaining
    }

    /// Completed trials with their outcome annotations, in completion order.
    #[must_use]
    pub fn completed(&self) -> &[TrialDescriptor] {
        &self.completed
    }

    /// Whether every trial has been completed.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Audit trail.
    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Derive the lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.done {
            SessionState::Done
        } else if self.remaining.is_empty() {
            SessionState::Uninitialized
        } else {
            SessionState::InProgress
        }
    }

    /// Number of accepted trials so far.
    #[must_use]
    pub fn accepted_count(&self) -> usize {
        self.completed
            .iter()
            .filter(|t| t.accepted().unwrap_or(true))
            .count()
    }

    pub(crate) fn remaining_mut(&mut self) -> &mut VecDeque<TrialDescriptor> {
        &mut self.remaining
    }

    pub(crate) fn push_completed(&mut self, trial: TrialDescriptor) {
        self.completed.push(trial);
    }

    pub(crate) fn set_remaining(&mut self, sequence: Vec<TrialDescriptor>) {
        self.remaining = sequence.into();
    }

    pub(crate) fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub(crate) fn mark_done(&mut self) {
        self.done = true;
        self.remaining.clear();
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub(crate) fn push_log(&mut self, message: impl Into<String>) {
        self.log.push(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }
}

/// Builder for `SessionRecord`.
#[derive(Debug)]
pub struct SessionRecordBuilder {
    subject_id: String,
    experiment: String,
    project_id: Option<String>,
    user_id: String,
    language: Option<String>,
    created_at: DateTime<Utc>,
    remaining: Vec<TrialDescriptor>,
    completed: Vec<TrialDescriptor>,
    done: bool,
}

impl SessionRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(subject_id: impl Into<String>, experiment: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            experiment: experiment.into(),
            project_id: None,
            user_id: "unknown".to_string(),
            language: None,
            created_at: Utc::now(),
            remaining: Vec::new(),
            completed: Vec::new(),
            done: false,
        }
    }

    /// Set the project ID.
    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set the experimenter/user ID.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the testing language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Seed the control sequence.
    #[must_use]
    pub fn remaining(mut self, remaining: Vec<TrialDescriptor>) -> Self {
        self.remaining = remaining;
        self
    }

    /// Seed completed trials.
    #[must_use]
    pub fn completed(mut self, completed: Vec<TrialDescriptor>) -> Self {
        self.completed = completed;
        self
    }

    /// Mark the record as finished. Clears `remaining`.
    #[must_use]
    pub const fn done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Build the `SessionRecord`.
    #[must_use]
    pub fn build(self) -> SessionRecord {
        let remaining = if self.done {
            VecDeque::new()
        } else {
            self.remaining.into()
        };

        SessionRecord {
            subject_id: self.subject_id,
            experiment: self.experiment,
            project_id: self.project_id,
            user_id: self.user_id,
            language: self.language,
            created_at: self.created_at,
            updated_at: self.created_at,
            started_at: None,
            finished_at: self.done.then_some(self.created_at),
            remaining,
            completed: self.completed,
            done: self.done,
            log: Vec::new(),
        }
    }
}
