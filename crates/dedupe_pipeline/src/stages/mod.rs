//! crates/dedupe_pipeline/src/stages/mod.rs
//! Stage drivers. Each driver is a pure artifact→artifact function: read
//! inputs from the run directory, call into `dedupe_match`, write outputs.
//! That shape is what makes resume trivial — no stage depends on
//! in-memory state from an earlier stage.

pub mod alias;
pub mod candidates;
pub mod disposition;
pub mod exact_equals;
pub mod filter;
pub mod group;
pub mod normalize;
pub mod output;
pub mod survivorship;

use crate::executor::Executor;
use crate::PipelineError;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use dedupe_core::config::{EngineConfig, ResolvedSimilarity};
use dedupe_core::entities::{CandidatePair, RunType, StageName};
use dedupe_core::ids::{AccountId, RunId};
use dedupe_io::artifacts::{self, RunPaths};
use dedupe_io::tabular::{self, NormalizedRow};
use dedupe_match::grouping::{self, GroupingOutcome, ScoredEdge};

/// Everything a stage driver needs, borrowed for the stage's duration.
pub struct StageContext<'a> {
    pub paths: &'a RunPaths,
    pub config: &'a EngineConfig,
    pub sim: ResolvedSimilarity,
    pub input_path: &'a Path,
    pub input_hash: &'a str,
    pub config_hash: &'a str,
    pub run_id: &'a RunId,
    pub run_type: RunType,
    /// Deterministic run seed (derived from the input hash).
    pub seed: u64,
    pub executor: &'a Executor,
    pub stop: &'a AtomicBool,
}

/// Signature every stage driver satisfies: returns the artifact names
/// (relative to the run) it wrote.
pub type StageResult = Result<Vec<String>, PipelineError>;

pub(crate) fn stage_failed(stage: StageName, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::StageFailed { stage, message: err.to_string() }
}

// ----------------------------- shared loaders -----------------------------

/// The filtered (active) account table, sorted by account id.
pub(crate) fn load_filtered(ctx: &StageContext<'_>) -> Result<Vec<NormalizedRow>, PipelineError> {
    Ok(tabular::read_normalized(&ctx.paths.interim(artifacts::ACCOUNTS_FILTERED))?)
}

/// Index of account id → dense record index (positions in the sorted
/// filtered table).
pub(crate) fn id_index(rows: &[NormalizedRow]) -> BTreeMap<AccountId, u32> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| (r.record.account_id.clone(), i as u32))
        .collect()
}

/// Convert persisted candidate pairs into index-space edges.
pub(crate) fn scored_edges(
    pairs: &[CandidatePair],
    index: &BTreeMap<AccountId, u32>,
) -> Result<Vec<ScoredEdge>, PipelineError> {
    pairs
        .iter()
        .map(|p| {
            let a = *index.get(&p.id_a).ok_or_else(|| {
                PipelineError::Config(format!("pair references unknown id {}", p.id_a))
            })?;
            let b = *index.get(&p.id_b).ok_or_else(|| {
                PipelineError::Config(format!("pair references unknown id {}", p.id_b))
            })?;
            Ok(ScoredEdge { a, b, score: p.score, suffix_match: p.suffix_match })
        })
        .collect()
}

/// Recompute connected components from the persisted pairs. Deterministic,
/// so grouping-dependent stages can rebuild edges instead of persisting a
/// second edge artifact.
pub(crate) fn recompute_components(
    ctx: &StageContext<'_>,
    rows: &[NormalizedRow],
) -> Result<GroupingOutcome, PipelineError> {
    let pairs = tabular::read_pairs(&ctx.paths.interim(artifacts::CANDIDATE_PAIRS))?;
    let index = id_index(rows);
    let edges = scored_edges(&pairs, &index)?;
    let norms: Vec<_> = rows.iter().map(|r| r.norm.clone()).collect();
    Ok(grouping::group_components(
        &norms,
        &edges,
        &ctx.sim,
        &ctx.config.grouping,
        &ctx.config.blocking.stop_tokens,
    ))
}
