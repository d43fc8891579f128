//! crates/dedupe_pipeline/src/stages/alias.rs
//! ALIAS_MATCHING stage: score extracted alias candidates against the
//! corpus (shared-token candidates, same scorer, high + suffix gate).
//! Parallel over record chunks; matches are cross-links only.

use super::{load_filtered, stage_failed, StageContext, StageResult};

use std::collections::BTreeMap;

use dedupe_core::entities::StageName;
use dedupe_core::ids::GroupId;
use dedupe_io::artifacts;
use dedupe_io::tabular;
use dedupe_match::alias::{match_record, sort_matches, AliasIndex};

use crate::PipelineError;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::AliasMatching;

    let rows = load_filtered(ctx)?;
    let groups = tabular::read_groups(&ctx.paths.interim(artifacts::GROUPS))?;
    if groups.len() != rows.len() {
        return Err(stage_failed(STAGE, "group rows do not cover the active set"));
    }

    // Component ordinals from the persisted assignment (rows and groups
    // share the account-id sort).
    let mut ordinal_of: BTreeMap<&GroupId, u32> = BTreeMap::new();
    let mut group_ids: Vec<GroupId> = Vec::new();
    let mut group_of: Vec<u32> = Vec::with_capacity(groups.len());
    for g in &groups {
        let next = ordinal_of.len() as u32;
        let ord = *ordinal_of.entry(&g.group_id).or_insert(next);
        if ord == next {
            group_ids.push(g.group_id.clone());
        }
        group_of.push(ord);
    }

    let ids: Vec<_> = rows.iter().map(|r| r.record.account_id.clone()).collect();
    let norms: Vec<_> = rows.iter().map(|r| r.norm.clone()).collect();
    let index = AliasIndex::build(
        &norms,
        ctx.config.blocking.min_token_len,
        &ctx.config.blocking.stop_tokens,
    );

    let record_indices: Vec<u32> = (0..rows.len() as u32).collect();
    let sim = ctx.sim;
    let nested = ctx
        .executor
        .map_chunks(&record_indices, ctx.stop, |chunk| {
            chunk
                .iter()
                .map(|&i| match_record(i, &ids, &norms, &group_of, &group_ids, &sim, &index))
                .collect::<Vec<_>>()
        })
        .map_err(|_| PipelineError::Interrupted { stage: STAGE })?;

    let mut matches: Vec<_> = nested.into_iter().flatten().collect();
    sort_matches(&mut matches);
    tracing::info!(stage = %STAGE, matches = matches.len(), "alias matching done");

    tabular::write_alias_matches(&ctx.paths.interim(artifacts::ALIAS_MATCHES), &matches)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![artifacts::ALIAS_MATCHES.to_string()])
}
