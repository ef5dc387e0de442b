//! Core library surface for the Mouse Records Manager.
//!
//! The `bin` target drives these modules in order: load configuration, open
//! the record store, optionally bootstrap it from remote snapshots, run the
//! terminal UI, and publish the collections back.
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod session;
pub mod ui;

/// The record store and its CSV helpers.
pub use db::{read_csv, write_csv, RecordStore};

/// Configuration types handed to the store and session code.
pub use config::{Config, StoreConfig, SyncConfig};

/// Domain types that other layers manipulate.
pub use models::{Collection, Column, Outcome, Record};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
