//! crates/dedupe_pipeline/src/stages/candidates.rs
//! CANDIDATE_GENERATION stage: multi-strategy blocking over the active
//! records (exact-equal sets participate through their representative
//! only), parallel scoring with the cheap gate, the keep rule, and the
//! spanning-tree pairs from the exact pass merged in. Output is sorted
//! `(id_a, id_b, score desc, strategy)`.

use super::{load_filtered, stage_failed, StageContext, StageResult};

use std::collections::BTreeSet;

use dedupe_core::determinism::{cmp_pairs_scored, order_pair};
use dedupe_core::entities::{CandidatePair, PairStrategy, StageName};
use dedupe_core::score::SCORE_MAX;
use dedupe_io::artifacts;
use dedupe_io::tabular;
use dedupe_match::blocking::{generate_pairs, PairSeed};
use dedupe_match::similarity::{keep_scored, score_pair};

use crate::PipelineError;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::CandidateGeneration;

    let rows = load_filtered(ctx)?;
    let exact = tabular::read_exact_groups(&ctx.paths.interim(artifacts::EXACT_RAW_GROUPS))?;

    // Exact-equal non-representatives are pre-merged: they join through
    // the spanning tree, not through blocking.
    let absorbed: BTreeSet<&str> = exact
        .iter()
        .flat_map(|g| g.members.iter().skip(1).map(|m| m.as_str()))
        .collect();
    let active: Vec<u32> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| !absorbed.contains(r.record.account_id.as_str()))
        .map(|(i, _)| i as u32)
        .collect();

    let active_norms: Vec<_> = active.iter().map(|&i| rows[i as usize].norm.clone()).collect();
    let outcome = generate_pairs(&active_norms, &ctx.config.blocking, ctx.seed);
    tracing::info!(
        stage = %STAGE,
        active = active.len(),
        seeds = outcome.seeds.len(),
        blocks = outcome.stats.len(),
        "blocking done"
    );
    if outcome.total_capped {
        tracing::warn!(stage = %STAGE, budget = ctx.config.blocking.max_pairs_total, "global pair budget hit");
    }
    if outcome.stats.iter().any(|s| s.capped) {
        tracing::warn!(
            stage = %STAGE,
            capped_blocks = outcome.stats.iter().filter(|s| s.capped).count(),
            "per-block caps hit"
        );
    }

    // Parallel scoring. Seeds index into `active`; map back to the row
    // space when building pairs.
    let sim = ctx.sim;
    let high = sim.high;
    let scored: Vec<CandidatePair> = ctx
        .executor
        .map_chunks(&outcome.seeds, ctx.stop, |chunk: &[PairSeed]| {
            chunk
                .iter()
                .filter_map(|seed| {
                    let ra = &rows[active[seed.a as usize] as usize];
                    let rb = &rows[active[seed.b as usize] as usize];
                    let s = score_pair(&ra.norm, &rb.norm, &sim)?;
                    if !keep_scored(&s, &sim) {
                        return None;
                    }
                    let (id_a, id_b) =
                        order_pair(ra.record.account_id.clone(), rb.record.account_id.clone());
                    Some(CandidatePair {
                        id_a,
                        id_b,
                        score: s.score,
                        suffix_match: s.suffix_match,
                        ratio_name: s.ratio_name,
                        ratio_set: s.ratio_set,
                        jaccard_bp: s.jaccard_bp,
                        block_key: seed.block_key.clone(),
                        strategy: seed.strategy,
                        high_conf: s.score >= high,
                        pairs_capped: seed.capped,
                    })
                })
                .collect()
        })
        .map_err(|_| PipelineError::Interrupted { stage: STAGE })?;

    // Spanning-tree pairs from the exact pass.
    let mut pairs = scored;
    for g in &exact {
        for member in g.members.iter().skip(1) {
            pairs.push(CandidatePair {
                id_a: g.representative.clone(),
                id_b: member.clone(),
                score: SCORE_MAX,
                suffix_match: true,
                ratio_name: 100,
                ratio_set: 100,
                jaccard_bp: 10_000,
                block_key: "exact_raw".to_string(),
                strategy: PairStrategy::ExactRaw,
                high_conf: true,
                pairs_capped: false,
            });
        }
    }
    pairs.sort_by(cmp_pairs_scored);
    tracing::info!(stage = %STAGE, kept = pairs.len(), "scoring done");

    tabular::write_pairs(&ctx.paths.interim(artifacts::CANDIDATE_PAIRS), &pairs)
        .map_err(|e| stage_failed(STAGE, e))?;
    tabular::write_block_stats(&ctx.paths.interim(artifacts::BLOCK_STATS), &outcome.stats)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![artifacts::CANDIDATE_PAIRS.to_string(), artifacts::BLOCK_STATS.to_string()])
}
