//! crates/dedupe_pipeline/src/stages/survivorship.rs
//! SURVIVORSHIP stage: primary selection by the configured tie-breaker
//! order, merge previews for conflicted groups, and the per-member edge
//! metrics (weakest edge / direct score to the primary) over the
//! admitted-edge tree.

use super::{load_filtered, recompute_components, stage_failed, StageContext, StageResult};

use std::collections::BTreeMap;

use dedupe_core::entities::StageName;
use dedupe_io::artifacts;
use dedupe_io::hasher;
use dedupe_io::loaders;
use dedupe_io::tabular::{self, SurvivorshipRow};
use dedupe_match::grouping::edge_metrics_from_primary;
use dedupe_match::survivorship::{merge_preview, select_primary};

use std::path::Path;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::Survivorship;

    let rows = load_filtered(ctx)?;
    let outcome = recompute_components(ctx, &rows)?;
    let records: Vec<_> = rows.iter().map(|r| r.record.clone()).collect();

    let survivorship_cfg = &ctx.config.survivorship;
    let ranks = loaders::load_relationship_ranks(
        survivorship_cfg.relationship_rank_path.as_deref().map(Path::new),
        survivorship_cfg.default_relationship_rank,
    )?;

    let mut table: Vec<SurvivorshipRow> = Vec::with_capacity(rows.len());
    for component in &outcome.components {
        let members: Vec<_> = component
            .members
            .iter()
            .map(|&i| records[i as usize].account_id.clone())
            .collect();
        let group_id = hasher::group_id(&members, ctx.config_hash)?;

        let choice =
            select_primary(&component.members, &records, &ranks, &survivorship_cfg.tie_breakers);
        let preview = if component.members.len() > 1 {
            merge_preview(&component.members, &records).unwrap_or_default()
        } else {
            String::new()
        };
        let metrics: BTreeMap<u32, _> = edge_metrics_from_primary(component, choice.primary);

        for &member in &component.members {
            let is_primary = member == choice.primary;
            let (weakest, direct) = if is_primary {
                (None, None)
            } else {
                match metrics.get(&member) {
                    Some(&(w, d)) => (Some(w), Some(d)),
                    None => (None, None), // unreached members (no admitted path)
                }
            };
            table.push(SurvivorshipRow {
                account_id: records[member as usize].account_id.clone(),
                group_id: group_id.clone(),
                is_primary,
                primary_reason: choice.primary_reason.clone(),
                tie_breaker_applied: choice.tie_breaker_applied.clone(),
                weakest_edge_to_primary: weakest,
                score_to_primary: direct,
                merge_preview: preview.clone(),
            });
        }
    }
    table.sort_by(|a, b| a.account_id.as_str().cmp(b.account_id.as_str()));
    tracing::info!(stage = %STAGE, rows = table.len(), "survivorship done");

    tabular::write_survivorship(&ctx.paths.interim(artifacts::SURVIVORSHIP), &table)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![artifacts::SURVIVORSHIP.to_string()])
}
