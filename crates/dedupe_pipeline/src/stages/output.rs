//! crates/dedupe_pipeline/src/stages/output.rs
//! FINAL_OUTPUT stage: compose the review-ready dataset from the interim
//! artifacts, fold in alias-driven Verify overrides (rule priority:
//! blacklist Delete survives, everything else yields to the alias rule),
//! re-attach filtered-out rows with their own dispositions, and
//! materialize the group stats/details projections.

use super::{stage_failed, StageContext, StageResult};

use std::collections::BTreeMap;

use dedupe_core::entities::{Disposition, StageName};
use dedupe_core::ids::{AccountId, GroupId};
use dedupe_core::score::ScoreCenti;
use dedupe_io::artifacts;
use dedupe_io::canonical_json::to_canonical_bytes;
use dedupe_io::clock::now_utc;
use dedupe_io::hasher;
use dedupe_io::tabular::{self, GroupDetailsRow, GroupStatsRow, ReviewRow};
use dedupe_io::write_bytes_atomically;
use dedupe_match::alias::alias_rollup;

use crate::DAG_VERSION;

pub fn run(ctx: &StageContext<'_>) -> StageResult {
    const STAGE: StageName = StageName::FinalOutput;

    let all_rows = tabular::read_normalized(&ctx.paths.interim(artifacts::ACCOUNTS_NORMALIZED))?;
    let active = tabular::read_normalized(&ctx.paths.interim(artifacts::ACCOUNTS_FILTERED))?;
    let filtered_out =
        tabular::read_filtered_out(&ctx.paths.interim(artifacts::ACCOUNTS_FILTERED_OUT))?;
    let groups = tabular::read_groups(&ctx.paths.interim(artifacts::GROUPS))?;
    let survivorship = tabular::read_survivorship(&ctx.paths.interim(artifacts::SURVIVORSHIP))?;
    let dispositions = tabular::read_dispositions(&ctx.paths.interim(artifacts::DISPOSITIONS))?;
    let alias_matches = tabular::read_alias_matches(&ctx.paths.interim(artifacts::ALIAS_MATCHES))?;

    if groups.len() != active.len() || survivorship.len() != active.len() || dispositions.len() != active.len() {
        return Err(stage_failed(STAGE, "interim artifacts disagree on the active row count"));
    }

    let rollup = alias_rollup(&alias_matches);
    let mut cross_refs: BTreeMap<&AccountId, Vec<String>> = BTreeMap::new();
    for m in &alias_matches {
        let entry = cross_refs.entry(&m.record_id).or_default();
        let tag = format!("{}({})", m.matched_group_id, dedupe_core::score::centi_to_string(m.score));
        if !entry.contains(&tag) {
            entry.push(tag);
        }
    }

    let mut review: Vec<ReviewRow> = Vec::with_capacity(all_rows.len());

    // Active records: the three interim tables share the account-id sort.
    for (i, row) in active.iter().enumerate() {
        let g = &groups[i];
        let s = &survivorship[i];
        let d = &dispositions[i];

        // Alias override (rule 2): Verify, unless rule 1 already deleted.
        let (disposition, reason) = match rollup.get(&row.record.account_id) {
            Some((matched_groups, sources)) if d.disposition != Disposition::Delete => {
                let mut names: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                (
                    Disposition::Verify,
                    format!(
                        "alias_matches_{}_groups_via_[{}]",
                        matched_groups.len(),
                        names.join(",")
                    ),
                )
            }
            _ => (d.disposition, d.disposition_reason.clone()),
        };

        review.push(ReviewRow {
            account_id: row.record.account_id.clone(),
            account_id_src: row.record.account_id_src.clone(),
            account_name: row.record.account_name.clone(),
            created_utc: row.record.created_utc.clone(),
            relationship: row.record.relationship.clone(),
            group_id: g.group_id.clone(),
            group_size: g.group_size,
            is_primary: s.is_primary,
            weakest_edge_to_primary: s.weakest_edge_to_primary,
            score_to_primary: s.score_to_primary,
            disposition,
            disposition_reason: reason,
            merge_preview: s.merge_preview.clone(),
            alias_cross_refs: cross_refs
                .get(&row.record.account_id)
                .map(|refs| refs.join(";"))
                .unwrap_or_default(),
        });
    }

    // Filtered-out records rejoin as singleton groups with their own
    // dispositions: noise is a delete candidate, the rest need eyes.
    let full_record: BTreeMap<&AccountId, &tabular::NormalizedRow> =
        all_rows.iter().map(|r| (&r.record.account_id, r)).collect();
    for dropped in &filtered_out {
        let Some(row) = full_record.get(&dropped.account_id) else {
            return Err(stage_failed(STAGE, format!("filtered-out id {} unknown", dropped.account_id)));
        };
        let group_id = hasher::group_id(&[dropped.account_id.clone()], ctx.config_hash)?;
        let (disposition, reason) = match dropped.drop_reason.as_str() {
            "noise" => (Disposition::Delete, "filtered:noise".to_string()),
            other => (Disposition::Verify, format!("filtered:{other}")),
        };
        review.push(ReviewRow {
            account_id: dropped.account_id.clone(),
            account_id_src: row.record.account_id_src.clone(),
            account_name: row.record.account_name.clone(),
            created_utc: row.record.created_utc.clone(),
            relationship: row.record.relationship.clone(),
            group_id,
            group_size: 1,
            is_primary: true,
            weakest_edge_to_primary: None,
            score_to_primary: None,
            disposition,
            disposition_reason: reason,
            merge_preview: String::new(),
            alias_cross_refs: String::new(),
        });
    }

    review.sort_by(|a, b| a.account_id.as_str().cmp(b.account_id.as_str()));

    // Group stats: one row per group, keyed by the primary.
    let mut max_score_of: BTreeMap<&GroupId, ScoreCenti> = BTreeMap::new();
    for g in &groups {
        max_score_of.insert(&g.group_id, g.max_score);
    }
    let mut stats: Vec<GroupStatsRow> = Vec::new();
    for row in review.iter().filter(|r| r.is_primary) {
        stats.push(GroupStatsRow {
            group_id: row.group_id.clone(),
            group_size: row.group_size,
            max_score: *max_score_of.get(&row.group_id).unwrap_or(&0),
            primary_name: row.account_name.clone(),
            disposition: row.disposition,
        });
    }
    stats.sort_by(|a, b| a.group_id.as_str().cmp(b.group_id.as_str()));

    let mut details: Vec<GroupDetailsRow> = review
        .iter()
        .map(|r| GroupDetailsRow {
            group_id: r.group_id.clone(),
            account_id: r.account_id.clone(),
            account_name: r.account_name.clone(),
            is_primary: r.is_primary,
            score_to_primary: r.score_to_primary,
            disposition: r.disposition,
        })
        .collect();
    details.sort_by(|a, b| {
        (a.group_id.as_str(), !a.is_primary, a.account_id.as_str()).cmp(&(
            b.group_id.as_str(),
            !b.is_primary,
            b.account_id.as_str(),
        ))
    });

    tabular::write_review_ready(&ctx.paths.processed(artifacts::REVIEW_READY), &review)
        .map_err(|e| stage_failed(STAGE, e))?;
    tabular::write_group_stats(&ctx.paths.processed(artifacts::GROUP_STATS), &stats)
        .map_err(|e| stage_failed(STAGE, e))?;
    tabular::write_group_details(&ctx.paths.processed(artifacts::GROUP_DETAILS), &details)
        .map_err(|e| stage_failed(STAGE, e))?;

    let meta = serde_json::json!({
        "schema_version": 1,
        "run_id": ctx.run_id.as_str(),
        "run_type": ctx.run_type,
        "dag_version": DAG_VERSION,
        "input_hash": ctx.input_hash,
        "config_hash": ctx.config_hash,
        "rows_input": all_rows.len(),
        "rows_active": active.len(),
        "rows_filtered_out": filtered_out.len(),
        "groups": stats.len(),
        "alias_matches": alias_matches.len(),
        "generated_utc": now_utc(),
    });
    write_bytes_atomically(
        &ctx.paths.processed(artifacts::REVIEW_META),
        &to_canonical_bytes(&meta).map_err(|e| stage_failed(STAGE, e))?,
    )
    .map_err(|e| stage_failed(STAGE, e))?;

    tracing::info!(stage = %STAGE, rows = review.len(), groups = stats.len(), "final output written");
    Ok(vec![
        format!("processed/{}", artifacts::REVIEW_READY),
        format!("processed/{}", artifacts::GROUP_STATS),
        format!("processed/{}", artifacts::GROUP_DETAILS),
        format!("processed/{}", artifacts::REVIEW_META),
    ])
}
