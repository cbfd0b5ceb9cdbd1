//! Session Store Tests
//!
//! File-backed persistence: round trips, the dry-run sentinel, identity
//! checks, and write failures.

use std::fs;

use expctl::config::Config;
use expctl::session::{
    record_file_name, FileSessionStore, SessionRecord, SessionState, SessionStore,
};
use expctl::trial::{TrialDescriptor, ACCEPTED_FIELD, RESPONSE_FIELD};
use expctl::Error;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> FileSessionStore {
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    FileSessionStore::new(&config)
}

fn sample_record(subject: &str) -> SessionRecord {
    let mut done = TrialDescriptor::new()
        .with_factor("mode", "telephone")
        .with_factor("stim", "banana.png")
        .with_factor("dur", 0.2);
    done.annotate(RESPONSE_FIELD, 48.5);
    done.annotate(ACCEPTED_FIELD, true);

    SessionRecord::builder(subject, "colour-priors")
        .project_id("pilot")
        .user_id("experimenter")
        .language("EN")
        .remaining(vec![
            TrialDescriptor::new()
                .with_factor("mode", "random")
                .with_factor("stim", "tree.png")
                .with_factor("dur", 0.1),
        ])
        .completed(vec![done])
        .build()
}

#[test]
fn test_save_then_load_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let record = sample_record("s01");

    store.save(&record).unwrap();
    let loaded = store.load("s01", "colour-priors").unwrap();

    assert_eq!(loaded, record);
    assert_eq!(loaded.state(), SessionState::InProgress);
}

#[test]
fn test_save_overwrites_previous_version() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store.save(&sample_record("s01")).unwrap();
    let finished = SessionRecord::builder("s01", "colour-priors").done(true).build();
    store.save(&finished).unwrap();

    assert!(store.load("s01", "colour-priors").unwrap().is_done());
    assert!(!store.path_for("s01", "colour-priors").with_extension("json.tmp").exists());
}

#[test]
fn test_missing_record_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let err = store.load("s01", "colour-priors").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn test_test_subject_never_written() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store.save(&sample_record("TEST")).unwrap();

    assert!(store.load("TEST", "colour-priors").unwrap_err().is_not_found());
    assert!(!store.path_for("TEST", "colour-priors").exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_custom_test_subject() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        test_subject: "DEMO".to_string(),
        ..Config::default()
    };
    let store = FileSessionStore::new(&config);

    store.save(&sample_record("DEMO")).unwrap();
    store.save(&sample_record("TEST")).unwrap();

    assert!(store.load("DEMO", "colour-priors").is_err());
    assert!(store.load("TEST", "colour-priors").is_ok());
}

#[test]
fn test_identity_mismatch_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    store.save(&sample_record("s02")).unwrap();
    fs::copy(
        store.path_for("s02", "colour-priors"),
        store.path_for("s01", "colour-priors"),
    )
    .unwrap();

    let err = store.load("s01", "colour-priors").unwrap_err();
    match err {
        Error::CorruptRecord { expected, found, .. } => {
            assert_eq!(expected, "s01/colour-priors");
            assert_eq!(found, "s02/colour-priors");
        }
        other => panic!("expected CorruptRecord, got {other:?}"),
    }
}

#[test]
fn test_undecodable_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::write(store.path_for("s01", "rdm"), b"{ not json").unwrap();

    assert!(matches!(
        store.load("s01", "rdm"),
        Err(Error::CorruptRecord { .. })
    ));
}

#[test]
fn test_project_scope_creates_subdirectory() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir).with_project(Some("pilot"));

    store.save(&sample_record("s01")).unwrap();

    let expected = dir
        .path()
        .join("pilot")
        .join(record_file_name("s01", "colour-priors"));
    assert!(expected.is_file());
}

#[test]
fn test_write_failure_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("data");
    fs::write(&blocker, b"a file where a directory should be").unwrap();

    let config = Config {
        data_dir: blocker,
        ..Config::default()
    };
    let store = FileSessionStore::new(&config);

    assert!(matches!(
        store.save(&sample_record("s01")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_colliding_file_name_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    assert_eq!(store.path_for("s_01", "x"), store.path_for("s", "01_x"));

    let first = SessionRecord::builder("s_01", "x")
        .remaining(vec![TrialDescriptor::new().with_factor("a", 1)])
        .build();
    store.save(&first).unwrap();

    let err = store
        .save(&SessionRecord::builder("s", "01_x").build())
        .unwrap_err();
    match err {
        Error::CorruptRecord { expected, found, .. } => {
            assert_eq!(expected, "s/01_x");
            assert_eq!(found, "s_01/x");
        }
        other => panic!("expected CorruptRecord, got {other:?}"),
    }
    assert_eq!(store.load("s_01", "x").unwrap(), first);
}

#[test]
fn test_undecodable_file_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let path = store.path_for("s01", "rdm");
    fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(
        store.save(&SessionRecord::builder("s01", "rdm").build()),
        Err(Error::CorruptRecord { .. })
    ));
    assert_eq!(fs::read(&path).unwrap(), b"{ not json");
}
