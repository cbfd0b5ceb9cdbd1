//! Session persistence
//!
//! This module holds the per-subject record of an experiment run and the
//! stores that persist it between sessions.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──generate──> InProgress ──last trial accepted──> Done
//!                               │    ▲
//!                               └────┘ advance / resume
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use expctl::session::{MemorySessionStore, SessionRecord, SessionStore};
//!
//! let store = MemorySessionStore::new();
//! let record = SessionRecord::builder("s01", "colour-priors")
//!     .user_id("experimenter")
//!     .build();
//!
//! store.save(&record).unwrap();
//! assert_eq!(store.load("s01", "colour-priors").unwrap(), record);
//!
//! // The dry-run subject is never written
//! store.save(&SessionRecord::new("TEST", "colour-priors")).unwrap();
//! assert!(store.load("TEST", "colour-priors").is_err());
//! ```

mod memory;
mod record;
mod store;

pub use memory::MemorySessionStore;
pub use record::{LogEntry, SessionRecord, SessionRecordBuilder, SessionState};
pub use store::{record_file_name, FileSessionStore, SessionStore, DEFAULT_TEST_SUBJECT};
