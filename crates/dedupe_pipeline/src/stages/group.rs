//! crates/dedupe_pipeline/src/stages/group.rs
//! GROUPING stage: connected components over the kept pairs, stable group
//! IDs from sorted membership + config hash, per-record assignment rows.

use super::{load_filtered, recompute_components, stage_failed, StageContext, StageResult};

use dedupe_core::entities::{EdgeReason, StageName};
use dedupe_io::artifacts;
use dedupe_io::hasher;
use dedupe_io::tabular::{self, GroupRow};

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::Grouping;

    let rows = load_filtered(ctx)?;
    let outcome = recompute_components(ctx, &rows)?;
    tracing::info!(
        stage = %STAGE,
        components = outcome.components.len(),
        gate_rejections = outcome.gate_rejections,
        canopy_rejections = outcome.canopy_rejections,
        "grouping done"
    );

    let mut table: Vec<GroupRow> = Vec::with_capacity(rows.len());
    for component in &outcome.components {
        let members: Vec<_> = component
            .members
            .iter()
            .map(|&i| rows[i as usize].record.account_id.clone())
            .collect();
        // Members are index-sorted and index order equals id order.
        let group_id = hasher::group_id(&members, ctx.config_hash)?;
        let representative = members[0].clone();
        let suffix_class = rows[component.representative as usize].norm.suffix_class;

        let high = component.edges.iter().filter(|e| e.reason == EdgeReason::High).count();
        let medium = component.edges.len() - high;
        let reason_summary = match (high, medium) {
            (0, 0) => String::new(),
            (h, 0) => format!("{}:{h}", EdgeReason::High.as_str()),
            (0, m) => format!("{}:{m}", EdgeReason::MediumSharedToken.as_str()),
            (h, m) => format!(
                "{}:{h};{}:{m}",
                EdgeReason::High.as_str(),
                EdgeReason::MediumSharedToken.as_str()
            ),
        };

        for id in &members {
            table.push(GroupRow {
                account_id: id.clone(),
                group_id: group_id.clone(),
                group_size: component.members.len() as u32,
                representative: representative.clone(),
                max_score: component.max_score,
                min_score: component.min_score,
                suffix_class,
                has_suffix_mismatch: component.has_suffix_mismatch,
                reason_summary: reason_summary.clone(),
            });
        }
    }
    table.sort_by(|a, b| a.account_id.as_str().cmp(b.account_id.as_str()));

    tabular::write_groups(&ctx.paths.interim(artifacts::GROUPS), &table)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![artifacts::GROUPS.to_string()])
}
