//! Error types for expctl
//!
//! Every error carries enough context (subject, experiment, path) for the
//! operator to act on it without digging through logs.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// expctl error types
#[derive(Error, Debug)]
pub enum Error {
    /// No session has been saved for this subject and experiment yet
    #[error("No session found for subject '{subject_id}' in experiment '{experiment}'")]
    NotFound {
        /// Requested subject identifier
        subject_id: String,
        /// Requested experiment name
        experiment: String,
    },

    /// The backing file exists but does not hold the requested session
    #[error("Corrupt session record at {}: expected {expected}, found {found}\nRefusing to overwrite; inspect or move the file manually.", path.display())]
    CorruptRecord {
        /// Backing location that was read
        path: PathBuf,
        /// Identity that was requested
        expected: String,
        /// Identity (or decode failure) that was found
        found: String,
    },

    /// Advancing a session that has already finished
    #[error("Session for subject '{subject_id}' in experiment '{experiment}' is already complete")]
    AlreadyComplete {
        /// Subject identifier
        subject_id: String,
        /// Experiment name
        experiment: String,
    },

    /// Factorial design cannot produce a usable control sequence
    #[error("Invalid design: {0}")]
    InvalidDesign(String),

    /// Trial is missing a field needed to score or chain it
    #[error("Invalid trial: {0}")]
    InvalidTrial(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Instruction content lookup failed
    #[error("Content error: {0}")]
    Content(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for the `NotFound` variant.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
