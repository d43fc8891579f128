//! crates/dedupe_io/src/artifacts.rs
//! Artifact names and per-run paths. Stage drivers refer to artifacts by
//! these constants; the stage state records them relative to the run
//! directory root so `validate_artifacts` can re-check existence.

use std::path::{Path, PathBuf};

// interim/{run_id}/
pub const ACCOUNTS_NORMALIZED: &str = "accounts_normalized.csv";
pub const ACCOUNTS_FILTERED: &str = "accounts_filtered.csv";
pub const ACCOUNTS_FILTERED_OUT: &str = "accounts_filtered_out.csv";
pub const EXACT_RAW_GROUPS: &str = "exact_raw_groups.csv";
pub const CANDIDATE_PAIRS: &str = "candidate_pairs.csv";
pub const GROUPS: &str = "groups.csv";
pub const SURVIVORSHIP: &str = "survivorship.csv";
pub const DISPOSITIONS: &str = "dispositions.csv";
pub const ALIAS_MATCHES: &str = "alias_matches.csv";
pub const BLOCK_STATS: &str = "block_stats.csv";
pub const PIPELINE_STATE: &str = "pipeline_state.json";

// processed/{run_id}/
pub const REVIEW_READY: &str = "review_ready.csv";
pub const GROUP_STATS: &str = "group_stats.csv";
pub const GROUP_DETAILS: &str = "group_details.csv";
pub const REVIEW_META: &str = "review_meta.json";
pub const PERF_SUMMARY: &str = "perf_summary.json";

/// Paths for one run under an output root.
#[derive(Clone, Debug)]
pub struct RunPaths {
    interim: PathBuf,
    processed: PathBuf,
}

impl RunPaths {
    pub fn new(outdir: &Path, run_id: &str) -> Self {
        RunPaths {
            interim: outdir.join("interim").join(run_id),
            processed: outdir.join("processed").join(run_id),
        }
    }

    pub fn interim_dir(&self) -> &Path {
        &self.interim
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed
    }

    pub fn interim(&self, name: &str) -> PathBuf {
        self.interim.join(name)
    }

    pub fn processed(&self, name: &str) -> PathBuf {
        self.processed.join(name)
    }

    pub fn state_path(&self) -> PathBuf {
        self.interim(PIPELINE_STATE)
    }

    /// Resolve a state-recorded artifact name (relative to the run) back
    /// to a filesystem path. Processed artifacts carry a `processed/`
    /// prefix in the state file.
    pub fn resolve(&self, recorded: &str) -> PathBuf {
        match recorded.strip_prefix("processed/") {
            Some(rest) => self.processed(rest),
            None => self.interim(recorded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let rp = RunPaths::new(Path::new("/data/out"), "abc12345_def67890_20260731120000");
        assert!(rp
            .interim(CANDIDATE_PAIRS)
            .ends_with("interim/abc12345_def67890_20260731120000/candidate_pairs.csv"));
        assert!(rp
            .processed(REVIEW_READY)
            .ends_with("processed/abc12345_def67890_20260731120000/review_ready.csv"));
        assert_eq!(rp.resolve("groups.csv"), rp.interim(GROUPS));
        assert_eq!(rp.resolve("processed/review_ready.csv"), rp.processed(REVIEW_READY));
    }
}
