//! crates/dedupe_io/src/run_store.rs
//! Run-scoped artifact store: `interim/{run_id}`, `processed/{run_id}`,
//! the run index, and the latest pointer. Index and pointer writes are
//! temp+rename atomic; the pointer is always recomputed from the index.
//! Destructive operations sit behind an explicit fuse and a
//! `keep_at_least` floor.

use crate::canonical_json::to_canonical_bytes;
use crate::clock::now_utc;
use crate::{write_bytes_atomically, IoError};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dedupe_core::entities::{RunRecord, RunStatus};
use serde::{Deserialize, Serialize};

/// Latest-run pointer document. The JSON file is authoritative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub empty_state: bool,
    pub updated_utc: String,
}

/// One reconciliation finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFinding {
    pub run_id: String,
    /// `orphan_directory` or `stale_index`.
    pub reason: String,
}

/// Cleanup outcome (dry-run unless the fuse is set).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub kept: usize,
    pub skipped_running: Vec<String>,
}

/// The store rooted at one output directory.
#[derive(Clone, Debug)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: &Path) -> Self {
        RunStore { root: root.to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn interim_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("interim").join(run_id)
    }

    pub fn processed_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("processed").join(run_id)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("run_index.json")
    }

    fn latest_path(&self) -> PathBuf {
        self.root.join("latest.json")
    }

    // ------------------------------ run index ------------------------------

    /// Load the run index; a missing file is an empty index, not an error.
    pub fn load_index(&self) -> Result<BTreeMap<String, RunRecord>, IoError> {
        match std::fs::read(self.index_path()) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(IoError::Read(e)),
        }
    }

    fn save_index(&self, index: &BTreeMap<String, RunRecord>) -> Result<(), IoError> {
        std::fs::create_dir_all(&self.root).map_err(IoError::Write)?;
        write_bytes_atomically(&self.index_path(), &to_canonical_bytes(index)?)
    }

    /// Insert or replace one run record and refresh the latest pointer.
    pub fn upsert_run(&self, record: &RunRecord) -> Result<(), IoError> {
        let mut index = self.load_index()?;
        index.insert(record.run_id.as_str().to_string(), record.clone());
        self.save_index(&index)?;
        self.recompute_latest(&index)
    }

    /// Update one run's status; unknown IDs are an index error.
    pub fn set_status(&self, run_id: &str, status: RunStatus) -> Result<(), IoError> {
        let mut index = self.load_index()?;
        let rec = index
            .get_mut(run_id)
            .ok_or_else(|| IoError::Index(format!("unknown run_id {run_id}")))?;
        rec.status = status;
        self.save_index(&index)?;
        self.recompute_latest(&index)
    }

    // ---------------------------- latest pointer ----------------------------

    /// Recompute the pointer from the index: newest `complete` run wins;
    /// none leaves the documented empty state.
    pub fn recompute_latest(&self, index: &BTreeMap<String, RunRecord>) -> Result<(), IoError> {
        let latest = index
            .values()
            .filter(|r| r.status == RunStatus::Complete)
            .max_by(|a, b| {
                (a.created_utc.as_str(), a.run_id.as_str())
                    .cmp(&(b.created_utc.as_str(), b.run_id.as_str()))
            })
            .map(|r| r.run_id.as_str().to_string());
        let pointer = LatestPointer {
            empty_state: latest.is_none(),
            run_id: latest,
            updated_utc: now_utc(),
        };
        write_bytes_atomically(&self.latest_path(), &to_canonical_bytes(&pointer)?)
    }

    /// Read the pointer; absent file means no runs yet.
    pub fn latest(&self) -> Result<Option<LatestPointer>, IoError> {
        match std::fs::read(self.latest_path()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IoError::Read(e)),
        }
    }

    // ------------------------------- deletion -------------------------------

    /// Delete one run (directories + index entry) and recompute the
    /// pointer. `fuse` must be set; `running` runs additionally require
    /// `allow_running`.
    pub fn delete_run(&self, run_id: &str, fuse: bool, allow_running: bool) -> Result<(), IoError> {
        if !fuse {
            return Err(IoError::Index("refusing to delete: fuse not set".into()));
        }
        let mut index = self.load_index()?;
        if let Some(rec) = index.get(run_id) {
            if rec.status == RunStatus::Running && !allow_running {
                return Err(IoError::Index(format!(
                    "refusing to delete running run {run_id} without override"
                )));
            }
        }
        for dir in [self.interim_dir(run_id), self.processed_dir(run_id)] {
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(IoError::Write)?;
            }
        }
        index.remove(run_id);
        self.save_index(&index)?;
        self.recompute_latest(&index)
    }

    /// Retention cleanup: keep the newest `keep` runs, never fewer than
    /// `keep_at_least` (unless `override_floor`). Without the fuse this is
    /// a dry run reporting what would be deleted. `allow_empty_state`
    /// mirrors the retention config: when false, a cleanup that would
    /// remove every run is refused outright.
    pub fn cleanup(
        &self,
        keep: usize,
        keep_at_least: usize,
        fuse: bool,
        allow_running: bool,
        override_floor: bool,
        allow_empty_state: bool,
    ) -> Result<CleanupReport, IoError> {
        let index = self.load_index()?;
        let effective_keep = if override_floor { keep } else { keep.max(keep_at_least) };
        if effective_keep == 0 && !allow_empty_state && !index.is_empty() {
            return Err(IoError::Index(
                "cleanup would empty the store; run.allow_empty_state is false".into(),
            ));
        }

        let mut runs: Vec<&RunRecord> = index.values().collect();
        // Newest first by (created_utc, run_id).
        runs.sort_by(|a, b| {
            (b.created_utc.as_str(), b.run_id.as_str())
                .cmp(&(a.created_utc.as_str(), a.run_id.as_str()))
        });

        let mut report = CleanupReport { kept: runs.len().min(effective_keep), ..Default::default() };
        for rec in runs.iter().skip(effective_keep) {
            let run_id = rec.run_id.as_str();
            if rec.status == RunStatus::Running && !allow_running {
                report.skipped_running.push(run_id.to_string());
                report.kept += 1;
                continue;
            }
            report.deleted.push(run_id.to_string());
            if fuse {
                self.delete_run(run_id, true, allow_running)?;
            }
        }
        Ok(report)
    }

    // ----------------------------- reconciliation -----------------------------

    /// Scan for orphan directories (on disk, not in the index) and stale
    /// index entries (in the index, no directory). Both are reported as
    /// cleanup candidates; nothing is modified.
    pub fn reconcile(&self) -> Result<Vec<ReconcileFinding>, IoError> {
        let index = self.load_index()?;
        let mut findings = Vec::new();

        let mut on_disk: Vec<String> = Vec::new();
        for area in ["interim", "processed"] {
            let dir = self.root.join(area);
            let entries = match std::fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(IoError::Read(e)),
            };
            for entry in entries {
                let entry = entry.map_err(IoError::Read)?;
                if entry.file_type().map_err(IoError::Read)?.is_dir() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if !on_disk.contains(&name) {
                        on_disk.push(name);
                    }
                }
            }
        }
        on_disk.sort();

        for name in &on_disk {
            if !index.contains_key(name) {
                findings
                    .push(ReconcileFinding { run_id: name.clone(), reason: "orphan_directory".into() });
            }
        }
        for run_id in index.keys() {
            let has_dir =
                self.interim_dir(run_id).is_dir() || self.processed_dir(run_id).is_dir();
            if !has_dir {
                findings
                    .push(ReconcileFinding { run_id: run_id.clone(), reason: "stale_index".into() });
            }
        }
        findings.sort_by(|a, b| (a.run_id.as_str(), a.reason.as_str()).cmp(&(b.run_id.as_str(), b.reason.as_str())));
        Ok(findings)
    }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use dedupe_core::entities::RunType;
    use dedupe_core::ids::RunId;

    fn record(run_id: &str, created: &str, status: RunStatus) -> RunRecord {
        RunRecord {
            run_id: RunId::from_str(run_id).unwrap(),
            input_hash: "a".repeat(64),
            config_hash: "b".repeat(64),
            input_path: "input.csv".into(),
            config_path: "".into(),
            created_utc: created.into(),
            status,
            run_type: RunType::Dev,
        }
    }

    fn rid(n: u8) -> String {
        format!("{:08x}_{:08x}_2026073100000{n}", n as u32, n as u32)
    }

    #[test]
    fn index_and_latest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        assert!(store.load_index().unwrap().is_empty());

        store.upsert_run(&record(&rid(1), "2026-07-30T00:00:00Z", RunStatus::Complete)).unwrap();
        store.upsert_run(&record(&rid(2), "2026-07-31T00:00:00Z", RunStatus::Running)).unwrap();

        // Running runs never win the pointer.
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.run_id.as_deref(), Some(rid(1).as_str()));

        store.set_status(&rid(2), RunStatus::Complete).unwrap();
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.run_id.as_deref(), Some(rid(2).as_str()));
    }

    #[test]
    fn deleting_latest_recomputes_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        store.upsert_run(&record(&rid(1), "2026-07-30T00:00:00Z", RunStatus::Complete)).unwrap();
        store.upsert_run(&record(&rid(2), "2026-07-31T00:00:00Z", RunStatus::Complete)).unwrap();
        std::fs::create_dir_all(store.interim_dir(&rid(2))).unwrap();

        store.delete_run(&rid(2), true, false).unwrap();
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.run_id.as_deref(), Some(rid(1).as_str()));
        assert!(!store.interim_dir(&rid(2)).exists());

        store.delete_run(&rid(1), true, false).unwrap();
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.run_id, None);
        assert!(latest.empty_state);
    }

    #[test]
    fn delete_requires_fuse_and_running_override() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        store.upsert_run(&record(&rid(1), "2026-07-30T00:00:00Z", RunStatus::Running)).unwrap();

        assert!(store.delete_run(&rid(1), false, true).is_err());
        assert!(store.delete_run(&rid(1), true, false).is_err());
        store.delete_run(&rid(1), true, true).unwrap();
        assert!(store.load_index().unwrap().is_empty());
    }

    #[test]
    fn cleanup_honors_floor_and_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        for n in 1..=5 {
            store
                .upsert_run(&record(&rid(n), &format!("2026-07-3{n}T00:00:00Z"), RunStatus::Complete))
                .unwrap();
        }

        // keep=1 but floor=3 → only 2 deletions; dry run deletes nothing.
        let report = store.cleanup(1, 3, false, false, false, true).unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(store.load_index().unwrap().len(), 5);

        let report = store.cleanup(1, 3, true, false, false, true).unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(store.load_index().unwrap().len(), 3);

        // Floor override goes all the way down to keep=1.
        let report = store.cleanup(1, 3, true, false, true, true).unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(store.load_index().unwrap().len(), 1);
    }

    #[test]
    fn reconcile_reports_orphans_and_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path());
        // Stale: indexed, no directory.
        store.upsert_run(&record(&rid(1), "2026-07-30T00:00:00Z", RunStatus::Complete)).unwrap();
        // Orphan: directory, not indexed.
        std::fs::create_dir_all(store.interim_dir(&rid(9))).unwrap();

        let findings = store.reconcile().unwrap();
        assert_eq!(findings.len(), 2);
        assert!(findings
            .iter()
            .any(|f| f.run_id == rid(1) && f.reason == "stale_index"));
        assert!(findings
            .iter()
            .any(|f| f.run_id == rid(9) && f.reason == "orphan_directory"));
    }
}
