//! crates/dedupe_pipeline/src/stages/normalize.rs
//! NORMALIZATION stage: ingest the resolved input CSV, canonicalize IDs
//! (generating deterministic ones for blank cells), coerce dates, and
//! normalize every name. Parallel over record chunks; output order is the
//! canonical id sort from `resolve_records`.

use super::{stage_failed, StageContext, StageResult};

use dedupe_core::entities::StageName;
use dedupe_io::artifacts;
use dedupe_io::tabular::{self, NormalizedRow};
use dedupe_match::normalize::normalize_name;

use crate::PipelineError;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::Normalization;

    let raw = tabular::read_input(ctx.input_path)?;
    let records = tabular::resolve_records(&raw, ctx.input_hash)?;
    tracing::info!(stage = %STAGE, rows = records.len(), "normalizing");

    let rows: Vec<NormalizedRow> = ctx
        .executor
        .map_chunks(&records, ctx.stop, |chunk| {
            chunk
                .iter()
                .map(|record| NormalizedRow {
                    record: record.clone(),
                    norm: normalize_name(&record.account_name),
                })
                .collect()
        })
        .map_err(|_| PipelineError::Interrupted { stage: STAGE })?;

    tabular::write_normalized(&ctx.paths.interim(artifacts::ACCOUNTS_NORMALIZED), &rows)
        .map_err(|e| stage_failed(STAGE, e))?;
    Ok(vec![artifacts::ACCOUNTS_NORMALIZED.to_string()])
}
