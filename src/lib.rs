//! # expctl: Resumable Experiment Sessions
//!
//! expctl is the control core of a behavioural-experiment runner. It turns a
//! factorial design into a control sequence, walks a subject through it one
//! trial at a time, and persists progress after every trial so an
//! interrupted session resumes exactly where it stopped.
//!
//! ## Components
//!
//! - [`control`]: factorial Control-Sequence Generator
//! - [`session`]: Session Record and Session Store (JSON files or memory)
//! - [`controller`]: Session Controller state machine with rejection
//!   re-queueing and adaptive chaining
//! - [`experiment`]: capability traits the controller is driven through
//!   (experiment definition, presenter, instruction content)
//! - [`trial`]: trial descriptors, outcomes, circular-error scoring
//! - [`config`]: immutable settings passed to stores and providers
//!
//! Rendering is not part of this crate. A presentation adapter implements
//! [`experiment::Presenter`] and feeds [`controller::SessionEvent`]s back.
//!
//! ## Example
//!
//! ```rust,no_run
//! use expctl::config::{Config, RunOptions};
//! use expctl::session::{FileSessionStore, SessionStore};
//!
//! let config = Config::load("expctl.toml")?;
//! let store = FileSessionStore::new(&config).with_project(Some("pilot"));
//!
//! match store.load("s01", "colour-priors") {
//!     Ok(record) => println!("{} trials left", record.remaining().len()),
//!     Err(e) if e.is_not_found() => println!("first session"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), expctl::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod experiment;
pub mod session;
pub mod trial;

pub use error::{Error, Result};
