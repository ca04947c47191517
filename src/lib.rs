//! zooquest - progress and notifications for the zoo database SQL course
//!
//! The `zooquest` binary is a thin front end over this library.
//!
//! # Module Organization
//!
//! - `catalog`: exercise categories A-Z and their tasks
//! - `progress`: completed tasks, completion rates and unlock detection
//! - `access`: which categories are open
//! - `notifications`: the persisted notification log and push setting
//! - `toast`: transient pop-ups and their timed lifecycle
//! - `storage`: SQLite-backed key-value store
//! - `clock` / `scheduler`: injectable time and virtual timers
//! - `config`: paths, catalog loading and log filtering
//! - `output`: JSON envelope and text helpers for the CLI
//! - `error`: error types and result aliases

pub mod access;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod notifications;
pub mod output;
pub mod progress;
pub mod scheduler;
pub mod storage;
pub mod toast;

pub use error::{Error, Result};
