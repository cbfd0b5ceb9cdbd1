//! In-memory session store using `DashMap`.
//!
//! Records are held in their serialized form, so loads go through the same
//! decode and identity checks as the file store. Data is lost on process
//! exit; useful for tests and demos.

use std::path::PathBuf;

use dashmap::DashMap;
use tracing::debug;

use super::store::{verify_identity, DEFAULT_TEST_SUBJECT};
use super::{SessionRecord, SessionStore};
use crate::{Error, Result};

/// In-memory session store keyed by (subject, experiment).
pub struct MemorySessionStore {
    records: DashMap<(String, String), String>,
    test_subject: String,
}

impl MemorySessionStore {
    /// Create a new in-memory store with the default test subject.
    #[must_use]
    pub fn new() -> Self {
        Self::with_test_subject(DEFAULT_TEST_SUBJECT)
    }

    /// Create a store with a custom dry-run sentinel.
    #[must_use]
    pub fn with_test_subject(test_subject: impl Into<String>) -> Self {
        Self {
            records: DashMap::new(),
            test_subject: test_subject.into(),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store raw serialized content under a key, bypassing validation.
    pub fn insert_raw(
        &self,
        subject_id: impl Into<String>,
        experiment: impl Into<String>,
        raw: impl Into<String>,
    ) {
        self.records
            .insert((subject_id.into(), experiment.into()), raw.into());
    }

    fn location(subject_id: &str, experiment: &str) -> PathBuf {
        PathBuf::from(format!("memory://{subject_id}/{experiment}"))
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, subject_id: &str, experiment: &str) -> Result<SessionRecord> {
        let key = (subject_id.to_string(), experiment.to_string());
        let raw = self
            .records
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound {
                subject_id: subject_id.to_string(),
                experiment: experiment.to_string(),
            })?;

        let location = Self::location(subject_id, experiment);
        let record: SessionRecord =
            serde_json::from_str(&raw).map_err(|e| Error::CorruptRecord {
                path: location.clone(),
                expected: format!("{subject_id}/{experiment}"),
                found: format!("undecodable record ({e})"),
            })?;

        verify_identity(&record, subject_id, experiment, &location)?;
        Ok(record)
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        if self.is_test_subject(record.subject_id()) {
            debug!(experiment = record.experiment(), "test subject, skipping save");
            return Ok(());
        }

        let raw = serde_json::to_string(record)?;
        self.records.insert(
            (record.subject_id().to_string(), record.experiment().to_string()),
            raw,
        );
        Ok(())
    }

    fn test_subject(&self) -> &str {
        &self.test_subject
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::TrialDescriptor;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let record = SessionRecord::builder("s01", "rdm")
            .remaining(vec![TrialDescriptor::new().with_factor("coherence", 0.5)])
            .build();

        store.save(&record).unwrap();
        assert_eq!(store.load("s01", "rdm").unwrap(), record);
    }

    #[test]
    fn test_memory_store_not_found() {
        let store = MemorySessionStore::new();
        assert!(store.load("s01", "rdm").unwrap_err().is_not_found());
    }

    #[test]
    fn test_memory_store_skips_test_subject() {
        let store = MemorySessionStore::new();
        store.save(&SessionRecord::new("TEST", "rdm")).unwrap();
        assert!(store.is_empty());
        assert!(store.load("TEST", "rdm").unwrap_err().is_not_found());
    }

    #[test]
    fn test_memory_store_detects_swapped_record() {
        let store = MemorySessionStore::new();
        let other = serde_json::to_string(&SessionRecord::new("s02", "rdm")).unwrap();
        store.insert_raw("s01", "rdm", other);

        assert!(matches!(
            store.load("s01", "rdm"),
            Err(Error::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_memory_store_detects_garbage() {
        let store = MemorySessionStore::new();
        store.insert_raw("s01", "rdm", "not json");

        assert!(matches!(
            store.load("s01", "rdm"),
            Err(Error::CorruptRecord { .. })
        ));
    }
}
