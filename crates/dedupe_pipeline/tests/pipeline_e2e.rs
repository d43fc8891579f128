//! End-to-end pipeline scenarios over real temp directories: suffix-gated
//! Verify, the exact-equals spanning tree, blacklist deletes, alias
//! cross-links, the resume hash guard, and worker-count determinism.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dedupe_core::entities::{Disposition, PairStrategy, ResumeReason, StageName};
use dedupe_io::artifacts::{self, RunPaths};
use dedupe_io::tabular;
use dedupe_pipeline::{run_pipeline, PipelineError, RunOptions};

fn write_input(dir: &Path, rows: &[(&str, &str)]) -> PathBuf {
    let mut csv = String::from("account_id,account_name,created_date,relationship\n");
    for (id, name) in rows {
        csv.push_str(&format!("{id},\"{name}\",,\n"));
    }
    let path = dir.join("input.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn opts(input: &Path, outdir: &Path) -> RunOptions {
    let mut o = RunOptions::new(input, outdir);
    o.workers = Some(2);
    o.cmdline = "test".to_string();
    o
}

fn id(n: u8) -> String {
    format!("001aaaaaaaaaa{n:02}")
}

fn run_paths(outdir: &Path, run_id: &str) -> RunPaths {
    RunPaths::new(outdir, run_id)
}

#[test]
fn suffix_gated_verify() {
    let dir = tempfile::tempdir().unwrap();
    let input =
        write_input(dir.path(), &[(&id(1), "Acme Holdings Inc"), (&id(2), "Acme Holdings LLC")]);
    let outdir = dir.path().join("out");
    let outs = run_pipeline(&opts(&input, &outdir)).unwrap();
    let paths = run_paths(&outdir, outs.run_id.as_str());

    // The pair exists as an annotation: suffix mismatch, score below high.
    let pairs = tabular::read_pairs(&paths.interim(artifacts::CANDIDATE_PAIRS)).unwrap();
    assert_eq!(pairs.len(), 1);
    assert!(!pairs[0].suffix_match);
    assert!(pairs[0].score <= 9_200);

    // Distinct groups, both rows Verify with a suffix-mismatch reason.
    let review = tabular::read_review_ready(&paths.processed(artifacts::REVIEW_READY)).unwrap();
    assert_eq!(review.len(), 2);
    assert_ne!(review[0].group_id, review[1].group_id);
    for row in &review {
        assert_eq!(row.disposition, Disposition::Verify);
        assert!(row.disposition_reason.contains("suffix_mismatch"), "{}", row.disposition_reason);
    }
}

#[test]
fn exact_equals_spanning_tree() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<(String, &str)> = (1..=5).map(|n| (id(n), "Globex Corp")).collect();
    let borrowed: Vec<(&str, &str)> = rows.iter().map(|(i, n)| (i.as_str(), *n)).collect();
    let input = write_input(dir.path(), &borrowed);
    let outdir = dir.path().join("out");
    let outs = run_pipeline(&opts(&input, &outdir)).unwrap();
    let paths = run_paths(&outdir, outs.run_id.as_str());

    // Exactly N-1 spanning pairs from exact_raw.
    let pairs = tabular::read_pairs(&paths.interim(artifacts::CANDIDATE_PAIRS)).unwrap();
    let exact: Vec<_> =
        pairs.iter().filter(|p| p.strategy == PairStrategy::ExactRaw).collect();
    assert_eq!(exact.len(), 4);
    assert!(exact.iter().all(|p| p.score == 10_000 && p.suffix_match));

    // One group of five; min id is primary; the rest Update.
    let review = tabular::read_review_ready(&paths.processed(artifacts::REVIEW_READY)).unwrap();
    assert_eq!(review.len(), 5);
    assert!(review.iter().all(|r| r.group_id == review[0].group_id));
    assert!(review.iter().all(|r| r.group_size == 5));
    assert!(review[0].is_primary, "min account_id must be primary");
    assert_eq!(review[0].disposition, Disposition::Keep);
    for row in &review[1..] {
        assert!(!row.is_primary);
        assert_eq!(row.disposition, Disposition::Update);
        assert_eq!(row.weakest_edge_to_primary, Some(10_000));
    }
}

#[test]
fn blacklist_delete() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &[(&id(1), "PNC is not sure")]);
    let outdir = dir.path().join("out");
    let outs = run_pipeline(&opts(&input, &outdir)).unwrap();
    let paths = run_paths(&outdir, outs.run_id.as_str());

    let review = tabular::read_review_ready(&paths.processed(artifacts::REVIEW_READY)).unwrap();
    assert_eq!(review.len(), 1);
    assert_eq!(review[0].disposition, Disposition::Delete);
    assert!(review[0].disposition_reason.starts_with("blacklist:"), "{}", review[0].disposition_reason);
}

#[test]
fn alias_cross_link() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            (&id(1), "BMW of Ontario (Penske Auto Group Ontario B1)"),
            (&id(2), "Penske Auto Group Ontario B1"),
        ],
    );
    let outdir = dir.path().join("out");
    let outs = run_pipeline(&opts(&input, &outdir)).unwrap();
    let paths = run_paths(&outdir, outs.run_id.as_str());

    let review = tabular::read_review_ready(&paths.processed(artifacts::REVIEW_READY)).unwrap();
    assert_eq!(review.len(), 2);
    // The records stay in distinct groups.
    assert_ne!(review[0].group_id, review[1].group_id);

    // The alias cross-link points at the other record's group, high conf.
    let matches = tabular::read_alias_matches(&paths.interim(artifacts::ALIAS_MATCHES)).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].record_id.as_str(), review[0].account_id.as_str());
    assert_eq!(matches[0].matched_group_id, review[1].group_id);
    assert!(matches[0].score >= 9_200);
    assert_eq!(matches[0].source.as_str(), "parentheses");

    // R1 is Verify with the alias reason; R2 stays a plain singleton.
    assert_eq!(review[0].disposition, Disposition::Verify);
    assert_eq!(review[0].disposition_reason, "alias_matches_1_groups_via_[parentheses]");
    assert!(!review[0].alias_cross_refs.is_empty());
    assert_eq!(review[1].disposition, Disposition::Keep);
}

#[test]
fn hash_guard_fresh_run_preserves_prior_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &[(&id(1), "Acme Inc"), (&id(2), "Zenith LLC")]);
    let outdir = dir.path().join("out");

    let first = run_pipeline(&opts(&input, &outdir)).unwrap();
    let first_paths = run_paths(&outdir, first.run_id.as_str());
    let first_review =
        std::fs::read(first_paths.processed(artifacts::REVIEW_READY)).unwrap();

    // Append a trailing space to the last data line: the normalized
    // content hash changes while the CSV still parses.
    let content = std::fs::read_to_string(&input).unwrap();
    std::fs::write(&input, format!("{} \n", content.trim_end_matches('\n'))).unwrap();

    let second = run_pipeline(&opts(&input, &outdir)).unwrap();
    assert_ne!(first.run_id, second.run_id, "changed input must start a fresh run");
    assert_eq!(second.resume_reason, ResumeReason::HashMismatch);
    assert_eq!(second.stages_executed, 9);

    // Prior run artifacts are untouched.
    let first_review_after =
        std::fs::read(first_paths.processed(artifacts::REVIEW_READY)).unwrap();
    assert_eq!(first_review, first_review_after);
}

#[test]
fn completed_run_resumes_as_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &[(&id(1), "Acme Inc"), (&id(2), "Acme Incorporated")]);
    let outdir = dir.path().join("out");

    let first = run_pipeline(&opts(&input, &outdir)).unwrap();
    assert_eq!(first.stages_executed, 9);

    let second = run_pipeline(&opts(&input, &outdir)).unwrap();
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.stages_executed, 0, "no stage may re-execute");
    assert_eq!(second.resume_reason, ResumeReason::SmartDetect);
}

#[test]
fn no_resume_reruns_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[(&id(1), "Acme Holdings Inc"), (&id(2), "Acme Holdings Incorporated"), (&id(3), "Zenith")],
    );
    let outdir = dir.path().join("out");

    let first = run_pipeline(&opts(&input, &outdir)).unwrap();
    let paths = run_paths(&outdir, first.run_id.as_str());
    let review_before = std::fs::read(paths.processed(artifacts::REVIEW_READY)).unwrap();
    let pairs_before = std::fs::read(paths.interim(artifacts::CANDIDATE_PAIRS)).unwrap();

    let mut again = opts(&input, &outdir);
    again.no_resume = true;
    let second = run_pipeline(&again).unwrap();
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.stages_executed, 9);

    assert_eq!(review_before, std::fs::read(paths.processed(artifacts::REVIEW_READY)).unwrap());
    assert_eq!(pairs_before, std::fs::read(paths.interim(artifacts::CANDIDATE_PAIRS)).unwrap());
}

#[test]
fn deterministic_across_worker_counts() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<(String, String)> = (1..=40)
        .map(|n| {
            let name = match n % 4 {
                0 => format!("Acme Holdings {n:02}"),
                1 => format!("Acme Holdings {n:02} Inc"),
                2 => format!("Zenith Partners {n:02} LLC"),
                _ => format!("Globex {n:02}"),
            };
            (format!("001aaaaaaaaa{n:03}"), name)
        })
        .collect();
    let borrowed: Vec<(&str, &str)> =
        rows.iter().map(|(i, n)| (i.as_str(), n.as_str())).collect();
    let input = write_input(dir.path(), &borrowed);

    // Force the pool on even for this small input.
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"parallelism": {"small_input_threshold": 0}}"#).unwrap();

    let run_with = |workers: usize, outdir: &Path| {
        let mut o = opts(&input, outdir);
        o.config_path = Some(config.clone());
        o.workers = Some(workers);
        o.chunk_size = Some(8);
        let outs = run_pipeline(&o).unwrap();
        let paths = run_paths(outdir, outs.run_id.as_str());
        (
            std::fs::read(paths.processed(artifacts::REVIEW_READY)).unwrap(),
            std::fs::read(paths.processed(artifacts::GROUP_STATS)).unwrap(),
        )
    };

    let out1 = dir.path().join("out1");
    let out8 = dir.path().join("out8");
    let (review1, stats1) = run_with(1, &out1);
    let (review8, stats8) = run_with(8, &out8);
    assert_eq!(review1, review8, "review_ready must be byte-identical across worker counts");
    assert_eq!(stats1, stats8, "group_stats must be byte-identical across worker counts");
}

#[test]
fn interrupt_marks_stage_and_resume_completes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), &[(&id(1), "Acme Inc"), (&id(2), "Acme Corp")]);
    let outdir = dir.path().join("out");

    let mut o = opts(&input, &outdir);
    o.stop = Arc::new(AtomicBool::new(true));
    match run_pipeline(&o) {
        Err(PipelineError::Interrupted { stage }) => {
            assert_eq!(stage, StageName::Normalization);
        }
        other => panic!("expected interruption, got {other:?}"),
    }

    o.stop.store(false, Ordering::SeqCst);
    let outs = run_pipeline(&o).unwrap();
    assert_eq!(outs.stages_executed, 9);
}

#[test]
fn every_row_gets_exactly_one_disposition() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        &[
            (&id(1), "Acme Holdings Inc"),
            (&id(2), "Acme Holdings Inc"),
            (&id(3), "unknown"),
            (&id(4), ""),
            (&id(5), "12345"),
            (&id(6), "Zenith Partners LLC"),
        ],
    );
    let outdir = dir.path().join("out");
    let outs = run_pipeline(&opts(&input, &outdir)).unwrap();
    let paths = run_paths(&outdir, outs.run_id.as_str());

    let review = tabular::read_review_ready(&paths.processed(artifacts::REVIEW_READY)).unwrap();
    assert_eq!(review.len(), 6, "filtered-out rows must rejoin at final output");

    // Filtered rows carry their own dispositions.
    let by_name = |name: &str| review.iter().find(|r| r.account_name == name).unwrap();
    assert_eq!(by_name("unknown").disposition, Disposition::Delete);
    assert_eq!(by_name("").disposition, Disposition::Verify);
}
