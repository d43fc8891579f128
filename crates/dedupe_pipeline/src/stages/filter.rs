//! crates/dedupe_pipeline/src/stages/filter.rs
//! FILTERING stage: split the normalized table into the active set and the
//! filtered-out audit artifact (with drop reasons). Filtered rows rejoin
//! at final output with their own dispositions; they never reach matching.

use super::{stage_failed, StageContext, StageResult};

use dedupe_core::entities::StageName;
use dedupe_io::artifacts;
use dedupe_io::tabular::{self, FilteredOutRow};
use dedupe_match::filter::filter_reason;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::Filtering;

    let rows = tabular::read_normalized(&ctx.paths.interim(artifacts::ACCOUNTS_NORMALIZED))?;

    let mut kept = Vec::with_capacity(rows.len());
    let mut dropped = Vec::new();
    for row in rows {
        match filter_reason(&row.norm) {
            None => kept.push(row),
            Some(reason) => dropped.push(FilteredOutRow {
                account_id: row.record.account_id.clone(),
                account_name: row.record.account_name.clone(),
                drop_reason: reason.as_str().to_string(),
            }),
        }
    }
    tracing::info!(stage = %STAGE, kept = kept.len(), dropped = dropped.len(), "filtered");

    tabular::write_normalized(&ctx.paths.interim(artifacts::ACCOUNTS_FILTERED), &kept)
        .map_err(|e| stage_failed(STAGE, e))?;
    tabular::write_filtered_out(&ctx.paths.interim(artifacts::ACCOUNTS_FILTERED_OUT), &dropped)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![
        artifacts::ACCOUNTS_FILTERED.to_string(),
        artifacts::ACCOUNTS_FILTERED_OUT.to_string(),
    ])
}
