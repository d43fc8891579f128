//! crates/dedupe_pipeline/src/stages/exact_equals.rs
//! EXACT_EQUALS stage: pre-merge rows whose cleaned raw names are
//! byte-equal. The artifact stores each equal-set with its min-id
//! representative; the candidate stage rebuilds the spanning-tree pairs
//! from it deterministically.

use super::{load_filtered, stage_failed, StageContext, StageResult};

use dedupe_core::entities::StageName;
use dedupe_io::artifacts;
use dedupe_io::tabular::{self, ExactGroupRow};
use dedupe_match::exact::exact_equal_groups;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::ExactEquals;

    let rows = load_filtered(ctx)?;
    let keyed: Vec<_> = rows
        .iter()
        .map(|r| (r.record.account_id.clone(), r.record.account_name.clone()))
        .collect();
    let (groups, pairs) = exact_equal_groups(&keyed);
    tracing::info!(stage = %STAGE, groups = groups.len(), spanning_pairs = pairs.len(), "exact-equals");

    let table: Vec<ExactGroupRow> = groups
        .into_iter()
        .map(|g| ExactGroupRow {
            representative: g.representative().clone(),
            size: g.members.len() as u32,
            members: g.members,
            key: g.key,
        })
        .collect();
    tabular::write_exact_groups(&ctx.paths.interim(artifacts::EXACT_RAW_GROUPS), &table)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![artifacts::EXACT_RAW_GROUPS.to_string()])
}
