//! Per-scenario state persistence for Corral.
//!
//! Each scenario owns one state directory (its `StateLocation`). The
//! `StateStore` reads and atomically replaces the JSON record inside it, and
//! `StoreLayout` maps a project onto directories under the store root.

pub mod layout;
pub mod state;

pub use layout::StoreLayout;
pub use state::{ScenarioState, StateStore};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory so a preceding `rename()` or `unlink()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("integrity check failed for state at '{location}': expected {expected}, got {actual}")]
    IntegrityFailure {
        location: String,
        expected: String,
        actual: String,
    },
    #[error("invalid state at '{location}': {reason}")]
    InvalidState { location: String, reason: String },
    #[error("state at '{0}' is locked by another process")]
    StateLocked(String),
}
