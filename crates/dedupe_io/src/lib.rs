//! dedupe_io — I/O layer of the dedupe engine.
//!
//! Canonical JSON (sorted keys, LF), SHA-256 content hashing with
//! normalized line endings, SHA-1 group-ID digests, CSV tables with fixed
//! schemas and enforced dtypes, the run store (run directories, run index,
//! latest pointer, cleanup, reconciliation), and atomic stage-state
//! persistence. No algorithmic logic lives here.

pub mod artifacts;
pub mod canonical_json;
pub mod clock;
pub mod hasher;
pub mod loaders;
pub mod run_store;
pub mod state;
pub mod tabular;

use std::io::Write as _;
use std::path::{Path, PathBuf};

/// I/O error taxonomy for the engine.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("read error: {0}")]
    Read(#[source] std::io::Error),
    #[error("write error: {0}")]
    Write(#[source] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("account ids must be 15/18 alphanumeric chars; {count} offender(s), sample: {samples:?}")]
    IdFormat { count: u64, samples: Vec<String> },
    #[error("hash error: {0}")]
    Hash(String),
    #[error("state error: {0}")]
    State(String),
    #[error("run index error: {0}")]
    Index(String),
}

/// Write bytes with a single trailing LF and an atomic rename. All index,
/// pointer, state, and artifact writes route through here.
pub fn write_bytes_atomically(path: &Path, bytes: &[u8]) -> Result<(), IoError> {
    let tmp = tmp_path_for(path);
    {
        let mut f = std::fs::File::create(&tmp).map_err(IoError::Write)?;
        f.write_all(bytes).map_err(IoError::Write)?;
        if !bytes.last().is_some_and(|b| *b == b'\n') {
            f.write_all(b"\n").map_err(IoError::Write)?;
        }
        f.sync_all().map_err(IoError::Write)?;
    }
    std::fs::rename(&tmp, path).map_err(IoError::Write)?;
    Ok(())
}

fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut s = final_path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_appends_lf_once() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.json");
        write_bytes_atomically(&p, b"{}").unwrap();
        assert_eq!(std::fs::read(&p).unwrap(), b"{}\n");
        write_bytes_atomically(&p, b"{}\n").unwrap();
        assert_eq!(std::fs::read(&p).unwrap(), b"{}\n");
        assert!(!tmp_path_for(&p).exists());
    }
}
