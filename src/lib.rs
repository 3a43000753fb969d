//! Core library surface for the Injury Lens TUI application.
//!
//! The binary only wires these pieces together: configuration and logging,
//! the SQLite prediction store, the injury classifier, and the capture sources
//! feeding it.
pub mod capture;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod ui;

/// Persistence entry points used by `main.rs` to bring up the store.
pub use db::{ensure_schema, open_in_memory, StoreEvent, StoreWorker};

pub use classifier::{Classifier, ScoringModel};
pub use config::AppConfig;
pub use error::{CaptureError, ClassifierError, ConfigError};
pub use models::{InjuryLabel, NewPrediction, PredictionRecord};

/// The interactive application entry point and state container.
pub use ui::{run_app, App, CaptureEnvironment};
