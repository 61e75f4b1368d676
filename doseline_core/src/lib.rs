#![forbid(unsafe_code)]

//! Core domain model and logic for the Doseline regimen timeline.
//!
//! This crate provides:
//! - Regimen tables with draft entries and scratch-row maintenance
//! - Time normalization and chronological ordering
//! - Next-entry inference
//! - Persistence (local store, shareable links, CSV)
//! - The reducer state and the curve-engine seam

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod table;
pub mod timeline;
pub mod autofill;
pub mod state;
pub mod presets;
pub mod snapshot;
pub mod store;
pub mod share;
pub mod csv_io;
pub mod curve;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::get_default_catalog;
pub use config::Config;
pub use table::{DoseEntry, EntryId, FieldEdit, RegimenTable};
pub use state::{needs_recompute, reduce, Event, Notice, Options, RegimenState};
pub use snapshot::{load_initial, snapshot, RegimenSnapshot, RestoreSource, TableSnapshot};
pub use store::{FileStore, MemoryStore, SnapshotStore};
pub use curve::{build_curve_input, CurveEngine, CurveInput};
