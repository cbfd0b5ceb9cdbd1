//! Runtime configuration
//!
//! [`Config`] holds the process-wide settings (where data and instructions
//! live, which subject ID means "dry run"). It is built once and handed to
//! the stores and content providers explicitly.
//!
//! [`RunOptions`] holds what the launcher collects per invocation: who is
//! being tested, which experiments, in which language.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::session::DEFAULT_TEST_SUBJECT;
use crate::{Error, Result};

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory session records are written to
    pub data_dir: PathBuf,
    /// Directory holding `<experiment>/<lang>/*.html` instruction files
    pub instructions_dir: PathBuf,
    /// Subject ID whose sessions are never persisted
    pub test_subject: String,
    /// Default testing language
    pub language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            instructions_dir: PathBuf::from("instructions"),
            test_subject: DEFAULT_TEST_SUBJECT.to_string(),
            language: "EN".to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid TOML or has
    /// values of the wrong type.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load settings: defaults, then the TOML file at `path` if it exists,
    /// then `EXPCTL_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(Error::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `EXPCTL_DATA_DIR`, `EXPCTL_INSTRUCTIONS_DIR`,
    /// `EXPCTL_TEST_SUBJECT` and `EXPCTL_LANGUAGE` from `lookup`.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EXPCTL_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("EXPCTL_INSTRUCTIONS_DIR") {
            self.instructions_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("EXPCTL_TEST_SUBJECT") {
            self.test_subject = v;
        }
        if let Some(v) = lookup("EXPCTL_LANGUAGE") {
            self.language = v;
        }
        self
    }
}

/// Per-invocation options collected by the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Subject being tested
    pub subject_id: String,
    /// Experiments to run, in order
    pub experiments: Vec<String>,
    /// Project the data belongs to
    pub project_id: Option<String>,
    /// Experimenter/user running the session
    pub user_id: String,
    /// Testing language
    pub language: String,
}

impl RunOptions {
    /// Options for a dry run of `experiments` under `config`'s defaults.
    #[must_use]
    pub fn new(config: &Config, experiments: Vec<String>) -> Self {
        Self {
            subject_id: config.test_subject.clone(),
            experiments,
            project_id: None,
            user_id: default_user(),
            language: config.language.clone(),
        }
    }

    /// True if this run will not persist anything.
    #[must_use]
    pub fn is_dry_run(&self, config: &Config) -> bool {
        self.subject_id == config.test_subject
    }

    /// Interpret `list` as a batch file (one experiment per line) if such a
    /// file exists, otherwise as whitespace-separated experiment names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the batch file cannot be read.
    pub fn parse_experiment_list(list: &str) -> Result<Vec<String>> {
        let path = Path::new(list);
        let raw = if !list.is_empty() && path.is_file() {
            fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("cannot read batch file {list}: {e}")))?
        } else {
            list.to_string()
        };

        Ok(raw.split_whitespace().map(str::to_string).collect())
    }
}

/// Current OS user, or `"unknown"`.
fn default_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
