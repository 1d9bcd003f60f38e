//! Job application tracking over a SQLite store that people may also edit by
//! hand. The [`Tracker`] keeps an in-memory copy of the store, reloads it when
//! the file's mtime moves, and refuses to write over changes it has not seen.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod models;
pub mod search;
pub mod status;
pub mod tracker;
pub mod writer;

pub use config::Config;
pub use error::{Result, TrackerError};
pub use models::{Candidate, Entry, Record, RowRef, Status, Summary};
pub use tracker::{Confirm, Tracker};
