//! crates/dedupe_io/src/state.rs
//! Stage-state persistence. A missing state file is the `Absent` case and
//! corrupt JSON is `Corrupt` — neither raises; only unexpected I/O errors
//! and plan violations (unknown stages, reordering) propagate as failures.

use crate::canonical_json::to_canonical_bytes;
use crate::{write_bytes_atomically, IoError};

use std::path::Path;

use dedupe_core::entities::PipelineState;

/// Outcome of loading `pipeline_state.json`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateLoad {
    Loaded(PipelineState),
    /// No previous run at this path.
    Absent,
    /// The file exists but does not parse; resume resets to clean state.
    Corrupt,
}

/// Load stage state. Unknown stage sets or reordering are rejected hard
/// (`State` error); unparseable JSON is the soft `Corrupt` case.
pub fn load_state(path: &Path) -> Result<StateLoad, IoError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateLoad::Absent),
        Err(e) => return Err(IoError::Read(e)),
    };
    let state: PipelineState = match serde_json::from_slice(&bytes) {
        Ok(s) => s,
        Err(_) => return Ok(StateLoad::Corrupt),
    };
    state
        .validate_plan()
        .map_err(|e| IoError::State(format!("{}: {e}", path.display())))?;
    Ok(StateLoad::Loaded(state))
}

/// Persist stage state atomically (write-to-temp, rename).
pub fn save_state(path: &Path, state: &PipelineState) -> Result<(), IoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(IoError::Write)?;
    }
    write_bytes_atomically(path, &to_canonical_bytes(state)?)
}

// === Tests ===
