//! Session Store - durable storage for session records
//!
//! One JSON document per (subject, experiment) pair. The location is a pure
//! function of the pair (and the store's project scope), so the same subject
//! always resumes from the same file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::SessionRecord;
use crate::config::Config;
use crate::{Error, Result};

/// Subject ID used for dry runs when no configuration says otherwise.
pub const DEFAULT_TEST_SUBJECT: &str = "TEST";

/// Persistence contract for session records.
///
/// Implementations are single-writer: two processes driving the same
/// (subject, experiment) pair concurrently is unsupported.
pub trait SessionStore {
    /// Load the record for a subject and experiment.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if nothing has been saved for the pair
    /// - [`Error::CorruptRecord`] if the stored record cannot be decoded or
    ///   belongs to a different subject/experiment
    /// - [`Error::Io`] if the backing location cannot be read
    fn load(&self, subject_id: &str, experiment: &str) -> Result<SessionRecord>;

    /// Persist a record, replacing any previous version.
    ///
    /// Records of the test subject are never written.
    ///
    /// # Errors
    ///
    /// - [`Error::CorruptRecord`] if the backing location already holds a
    ///   record for a different subject/experiment, or an undecodable one
    /// - [`Error::Io`] or [`Error::Serialization`] if the write fails
    fn save(&self, record: &SessionRecord) -> Result<()>;

    /// The sentinel subject ID whose records are never persisted.
    fn test_subject(&self) -> &str;

    /// True if `subject_id` is the dry-run sentinel.
    fn is_test_subject(&self, subject_id: &str) -> bool {
        subject_id == self.test_subject()
    }
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn load(&self, subject_id: &str, experiment: &str) -> Result<SessionRecord> {
        (**self).load(subject_id, experiment)
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        (**self).save(record)
    }

    fn test_subject(&self) -> &str {
        (**self).test_subject()
    }
}

/// Make an identifier safe to embed in a file name.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// File name for a (subject, experiment) pair.
#[must_use]
pub fn record_file_name(subject_id: &str, experiment: &str) -> String {
    format!("{}_{}.json", sanitize(subject_id), sanitize(experiment))
}

/// Check that a decoded record matches the requested identity.
pub(crate) fn verify_identity(
    record: &SessionRecord,
    subject_id: &str,
    experiment: &str,
    location: &Path,
) -> Result<()> {
    if record.subject_id() == subject_id && record.experiment() == experiment {
        Ok(())
    } else {
        Err(Error::CorruptRecord {
            path: location.to_path_buf(),
            expected: format!("{subject_id}/{experiment}"),
            found: format!("{}/{}", record.subject_id(), record.experiment()),
        })
    }
}

/// JSON-file session store rooted at [`Config::data_dir`].
///
/// Layout: `<data_dir>[/<project_id>]/<subject>_<experiment>.json`.
/// Saves are atomic: the record is written to a temporary sibling and
/// renamed into place.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
    test_subject: String,
}

impl FileSessionStore {
    /// Create a store from the shared configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.data_dir.clone(),
            test_subject: config.test_subject.clone(),
        }
    }

    /// Scope the store to a project subdirectory.
    #[must_use]
    pub fn with_project(mut self, project_id: Option<&str>) -> Self {
        if let Some(project) = project_id.filter(|p| !p.is_empty()) {
            self.root = self.root.join(sanitize(project));
        }
        self
    }

    /// Root directory records are written to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backing location for a (subject, experiment) pair.
    #[must_use]
    pub fn path_for(&self, subject_id: &str, experiment: &str) -> PathBuf {
        self.root.join(record_file_name(subject_id, experiment))
    }

    /// Refuse to replace a file that holds some other session, or that
    /// cannot be decoded. Sanitised file names are not injective.
    fn check_overwrite(path: &Path, record: &SessionRecord) -> Result<()> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let existing: SessionRecord =
            serde_json::from_slice(&bytes).map_err(|e| Error::CorruptRecord {
                path: path.to_path_buf(),
                expected: format!("{}/{}", record.subject_id(), record.experiment()),
                found: format!("undecodable record ({e})"),
            })?;

        verify_identity(&existing, record.subject_id(), record.experiment(), path)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, subject_id: &str, experiment: &str) -> Result<SessionRecord> {
        let path = self.path_for(subject_id, experiment);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no saved session");
                return Err(Error::NotFound {
                    subject_id: subject_id.to_string(),
                    experiment: experiment.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let record: SessionRecord =
            serde_json::from_slice(&bytes).map_err(|e| Error::CorruptRecord {
                path: path.clone(),
                expected: format!("{subject_id}/{experiment}"),
                found: format!("undecodable record ({e})"),
            })?;

        verify_identity(&record, subject_id, experiment, &path)?;

        debug!(
            path = %path.display(),
            remaining = record.remaining().len(),
            completed = record.completed().len(),
            "loaded session"
        );
        Ok(record)
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        if self.is_test_subject(record.subject_id()) {
            debug!(experiment = record.experiment(), "test subject, skipping save");
            return Ok(());
        }

        let path = self.path_for(record.subject_id(), record.experiment());
        Self::check_overwrite(&path, record)?;
        fs::create_dir_all(&self.root)?;

        let json = serde_json::to_vec_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        info!(
            path = %path.display(),
            remaining = record.remaining().len(),
            completed = record.completed().len(),
            done = record.is_done(),
            "saved session"
        );
        Ok(())
    }

    fn test_subject(&self) -> &str {
        &self.test_subject
    }
}
