//! dedupe_report — Pure read model over finished run artifacts.
//!
//! No pipeline coupling: callers (the review UI is the expected one) read
//! `group_stats` to paginate group lists without scanning the full table,
//! then fetch per-group details on demand. Every read runs under a
//! configurable deadline (default 30 s) and surfaces a typed timeout
//! instead of hanging a UI thread. Reads are safe concurrently with a
//! running pipeline because completed artifacts are immutable.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use dedupe_core::ids::GroupId;
use dedupe_io::artifacts::{self, RunPaths};
use dedupe_io::run_store::{LatestPointer, RunStore};
use dedupe_io::tabular::{self, GroupDetailsRow, GroupStatsRow, ReviewRow};
use dedupe_io::IoError;

/// Read-side error taxonomy. Timeouts surface to the UI only; they never
/// affect pipeline state.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("read exceeded the {0:?} deadline")]
    Timeout(Duration),
    #[error("no completed run available")]
    NoRun,
}

/// Default read deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Deadline-guarded reader over one output root.
#[derive(Clone, Debug)]
pub struct ReviewReader {
    root: PathBuf,
    deadline: Duration,
}

impl ReviewReader {
    pub fn new(root: &Path) -> Self {
        ReviewReader { root: root.to_path_buf(), deadline: DEFAULT_DEADLINE }
    }

    pub fn with_deadline(root: &Path, deadline: Duration) -> Self {
        ReviewReader { root: root.to_path_buf(), deadline }
    }

    /// The latest pointer (authoritative JSON file).
    pub fn latest(&self) -> Result<Option<LatestPointer>, ReportError> {
        Ok(RunStore::new(&self.root).latest()?)
    }

    /// Resolve the run to read: explicit id, or the latest complete run.
    pub fn resolve_run(&self, run_id: Option<&str>) -> Result<String, ReportError> {
        match run_id {
            Some(id) => Ok(id.to_string()),
            None => self
                .latest()?
                .and_then(|p| p.run_id)
                .ok_or(ReportError::NoRun),
        }
    }

    /// One row per group, sorted by group id. This is the pagination
    /// surface; it never scans `review_ready`.
    pub fn group_stats(&self, run_id: &str) -> Result<Vec<GroupStatsRow>, ReportError> {
        let path = RunPaths::new(&self.root, run_id).processed(artifacts::GROUP_STATS);
        self.with_timeout(move || tabular::read_group_stats(&path))
    }

    /// Per-group member rows (projection sorted by group id, primary
    /// first).
    pub fn group_details(
        &self,
        run_id: &str,
        group_id: &GroupId,
    ) -> Result<Vec<GroupDetailsRow>, ReportError> {
        let path = RunPaths::new(&self.root, run_id).processed(artifacts::GROUP_DETAILS);
        let wanted = group_id.clone();
        self.with_timeout(move || {
            Ok(tabular::read_group_details(&path)?
                .into_iter()
                .filter(|r| r.group_id == wanted)
                .collect())
        })
    }

    /// A page of the review-ready table.
    pub fn review_page(
        &self,
        run_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ReviewRow>, ReportError> {
        let path = RunPaths::new(&self.root, run_id).processed(artifacts::REVIEW_READY);
        self.with_timeout(move || {
            Ok(tabular::read_review_ready(&path)?
                .into_iter()
                .skip(offset)
                .take(limit)
                .collect())
        })
    }

    /// The run's review metadata document.
    pub fn review_meta(&self, run_id: &str) -> Result<serde_json::Value, ReportError> {
        let path = RunPaths::new(&self.root, run_id).processed(artifacts::REVIEW_META);
        self.with_timeout(move || {
            let bytes = std::fs::read(&path).map_err(IoError::Read)?;
            Ok(serde_json::from_slice(&bytes).map_err(IoError::Json)?)
        })
    }

    /// Run `f` on a worker thread; give up after the deadline. The worker
    /// finishes in the background and its late result is dropped.
    fn with_timeout<T, F>(&self, f: F) -> Result<T, ReportError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, IoError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(f());
        });
        match rx.recv_timeout(self.deadline) {
            Ok(result) => Ok(result?),
            Err(_) => Err(ReportError::Timeout(self.deadline)),
        }
    }
}

// === Tests ===
