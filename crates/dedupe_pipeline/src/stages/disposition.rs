//! crates/dedupe_pipeline/src/stages/disposition.rs
//! DISPOSITION stage: build the blacklist registry at stage entry,
//! assemble the per-record views (group role, suffix-mismatch flags), and
//! classify every active record. Alias-driven Verify overrides are
//! composed at final output, where the alias artifact exists.

use super::{load_filtered, recompute_components, stage_failed, StageContext, StageResult};

use dedupe_core::entities::StageName;
use dedupe_io::artifacts;
use dedupe_io::loaders;
use dedupe_io::tabular::{self, DispositionRow};
use dedupe_match::disposition::{classify_all, BlacklistRegistry, RecordView};

use std::path::Path;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::Disposition;

    let rows = load_filtered(ctx)?;
    let outcome = recompute_components(ctx, &rows)?;
    let survivorship =
        tabular::read_survivorship(&ctx.paths.interim(artifacts::SURVIVORSHIP))?;
    if survivorship.len() != rows.len() {
        return Err(stage_failed(STAGE, "survivorship rows do not cover the active set"));
    }

    let manual = loaders::load_manual_blacklist(
        ctx.config.disposition.blacklist.manual_path.as_deref().map(Path::new),
    )?;
    let registry = BlacklistRegistry::build(&ctx.config.disposition.blacklist, &manual)
        .map_err(|e| stage_failed(STAGE, e))?;

    // Component/group facts per record index.
    let mut group_size = vec![1u32; rows.len()];
    let mut group_mismatch = vec![false; rows.len()];
    for component in &outcome.components {
        for &m in &component.members {
            group_size[m as usize] = component.members.len() as u32;
            group_mismatch[m as usize] = component.has_suffix_mismatch;
        }
    }

    // Survivorship rows are sorted by account id, same as the active set.
    let views: Vec<RecordView<'_>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| RecordView {
            raw_name: &row.record.account_name,
            norm: &row.norm,
            group_size: group_size[i],
            group_has_suffix_mismatch: group_mismatch[i],
            suffix_annotation: outcome.suffix_flagged[i],
            is_primary: survivorship[i].is_primary,
            alias_groups: 0,
            alias_sources: Vec::new(),
        })
        .collect();

    let classified = classify_all(&views, &registry);
    let table: Vec<DispositionRow> = rows
        .iter()
        .zip(classified)
        .map(|(row, (disposition, reason))| DispositionRow {
            account_id: row.record.account_id.clone(),
            disposition,
            disposition_reason: reason,
        })
        .collect();
    tracing::info!(stage = %STAGE, rows = table.len(), "classified");

    tabular::write_dispositions(&ctx.paths.interim(artifacts::DISPOSITIONS), &table)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![artifacts::DISPOSITIONS.to_string()])
}
