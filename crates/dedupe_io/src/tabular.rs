//! crates/dedupe_io/src/tabular.rs
//! Typed CSV tables with fixed schemas. Every artifact reader validates
//! the header row and parses each field through an explicit converter, so
//! dtype drift is a load-time `Schema` error instead of a downstream
//! surprise. Writers serialize whole tables to bytes and land them with
//! the atomic temp+rename discipline.

use crate::hasher::generate_account_id;
use crate::{write_bytes_atomically, IoError};

use core::str::FromStr;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use dedupe_core::entities::{
    AliasSource, BlockStat, CandidatePair, Disposition, NameNorm, PairStrategy, Record,
    SuffixClass,
};
use dedupe_core::ids::{AccountId, GroupId};
use dedupe_core::score::{centi_from_string, centi_to_string, ScoreCenti};

// ------------------------------ field codecs ------------------------------

fn fmt_bool(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

fn parse_bool(s: &str, col: &str) -> Result<bool, IoError> {
    match s {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(IoError::Schema(format!("column {col}: bad bool {other:?}"))),
    }
}

fn parse_u32(s: &str, col: &str) -> Result<u32, IoError> {
    s.parse().map_err(|_| IoError::Schema(format!("column {col}: bad integer {s:?}")))
}

fn parse_u64(s: &str, col: &str) -> Result<u64, IoError> {
    s.parse().map_err(|_| IoError::Schema(format!("column {col}: bad integer {s:?}")))
}

fn parse_score(s: &str, col: &str) -> Result<ScoreCenti, IoError> {
    centi_from_string(s).map_err(|_| IoError::Schema(format!("column {col}: bad score {s:?}")))
}

fn parse_opt_score(s: &str, col: &str) -> Result<Option<ScoreCenti>, IoError> {
    if s.is_empty() {
        Ok(None)
    } else {
        parse_score(s, col).map(Some)
    }
}

fn fmt_opt_score(s: Option<ScoreCenti>) -> String {
    s.map(centi_to_string).unwrap_or_default()
}

fn parse_account_id(s: &str, col: &str) -> Result<AccountId, IoError> {
    AccountId::from_str(s).map_err(|e| IoError::Schema(format!("column {col}: {e}")))
}

fn parse_group_id(s: &str, col: &str) -> Result<GroupId, IoError> {
    GroupId::from_str(s).map_err(|e| IoError::Schema(format!("column {col}: {e}")))
}

fn opt_str(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Join multi-valued cells; the separator is reserved, so strip it from
/// the values first.
fn join_multi(values: &[String]) -> String {
    values.iter().map(|v| v.replace('|', " ")).collect::<Vec<_>>().join("|")
}

fn split_multi(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        Vec::new()
    } else {
        cell.split('|').map(str::to_string).collect()
    }
}

// ------------------------------ CSV plumbing ------------------------------

fn write_table(path: &Path, header: &[&str], rows: Vec<Vec<String>>) -> Result<(), IoError> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(header)?;
    for row in rows {
        debug_assert_eq!(row.len(), header.len());
        w.write_record(&row)?;
    }
    let bytes =
        w.into_inner().map_err(|e| IoError::Schema(format!("csv writer flush: {e}")))?;
    write_bytes_atomically(path, &bytes)
}

fn read_table(path: &Path, header: &[&str]) -> Result<Vec<csv::StringRecord>, IoError> {
    let mut r = csv::Reader::from_path(path)?;
    let found = r.headers()?.clone();
    let expected: Vec<&str> = header.to_vec();
    if found.iter().collect::<Vec<_>>() != expected {
        return Err(IoError::Schema(format!(
            "{}: header mismatch; expected {expected:?}, found {:?}",
            path.display(),
            found.iter().collect::<Vec<_>>()
        )));
    }
    let mut rows = Vec::new();
    for rec in r.records() {
        rows.push(rec?);
    }
    Ok(rows)
}

// -------------------------------- input file --------------------------------

/// One input row after external schema resolution, before ID
/// canonicalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInputRow {
    pub account_id: Option<String>,
    pub account_name: String,
    pub created_date: Option<String>,
    pub relationship: Option<String>,
}

/// Read the resolved input CSV. Spreadsheet bytes (XLSX/XLS magic) are
/// rejected here: conversion to CSV is the schema resolver's concern.
pub fn read_input(path: &Path) -> Result<Vec<RawInputRow>, IoError> {
    let bytes = std::fs::read(path).map_err(IoError::Read)?;
    if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        return Err(IoError::Schema(
            "input is a spreadsheet (XLSX/XLS); convert to CSV before running".into(),
        ));
    }

    let mut r = csv::ReaderBuilder::new().from_reader(bytes.as_slice());
    let headers = r.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h == name);

    let name_idx = col("account_name").ok_or_else(|| {
        IoError::Schema("required column account_name missing after schema resolution".into())
    })?;
    let id_idx = col("account_id");
    let created_idx = col("created_date");
    let rel_idx = col("relationship");

    let mut rows = Vec::new();
    for rec in r.records() {
        let rec = rec?;
        let cell = |i: Option<usize>| i.and_then(|i| rec.get(i)).map(str::trim).unwrap_or("");
        rows.push(RawInputRow {
            account_id: opt_str(cell(id_idx)),
            account_name: cell(Some(name_idx)).to_string(),
            created_date: opt_str(cell(created_idx)),
            relationship: opt_str(cell(rel_idx)),
        });
    }
    Ok(rows)
}

/// Excel's day zero (the 1900 leap-year bug included).
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Coerce a raw created-date cell to strict RFC3339 UTC seconds. Excel
/// serials (whole or fractional days) are recognized alongside the common
/// textual formats; unparseable values become `None`.
pub fn coerce_created(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(format_naive(naive));
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return d.and_hms_opt(0, 0, 0).map(format_naive);
        }
    }
    if let Ok(serial) = t.parse::<f64>() {
        // Serial window: 1.0 (1899-12-31) through year-9999 territory.
        if (1.0..=2_958_465.0).contains(&serial) {
            let days = serial.trunc() as i64;
            let secs = (serial.fract() * 86_400.0).round() as i64;
            let base = NaiveDate::from_ymd_opt(EXCEL_EPOCH.0, EXCEL_EPOCH.1, EXCEL_EPOCH.2)?
                .and_hms_opt(0, 0, 0)?;
            let dt = base + Duration::days(days) + Duration::seconds(secs);
            return Some(format_naive(dt));
        }
    }
    None
}

fn format_naive(naive: NaiveDateTime) -> String {
    Utc.from_utc_datetime(&naive).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Canonicalize IDs (generating deterministic ones for blank cells),
/// coerce dates, enforce ID uniqueness, and sort by canonical ID. The
/// sort fixes the index order every later stage relies on.
pub fn resolve_records(rows: &[RawInputRow], input_hash: &str) -> Result<Vec<Record>, IoError> {
    let mut bad: Vec<String> = Vec::new();
    let mut bad_count: u64 = 0;
    let mut records: Vec<Record> = Vec::with_capacity(rows.len());

    for (ordinal, row) in rows.iter().enumerate() {
        let (account_id, src) = match row.account_id.as_deref() {
            Some(raw) => match AccountId::canonicalize(raw) {
                Ok(id) => (id, raw.to_string()),
                Err(_) => {
                    bad_count += 1;
                    if bad.len() < 5 {
                        bad.push(raw.to_string());
                    }
                    continue;
                }
            },
            None => (generate_account_id(input_hash, ordinal as u64)?, String::new()),
        };
        records.push(Record {
            account_id,
            account_id_src: src,
            account_name: row.account_name.clone(),
            created_utc: row.created_date.as_deref().and_then(coerce_created),
            relationship: row.relationship.clone(),
        });
    }

    if bad_count > 0 {
        return Err(IoError::IdFormat { count: bad_count, samples: bad });
    }

    records.sort_by(|a, b| a.account_id.as_str().cmp(b.account_id.as_str()));
    for w in records.windows(2) {
        if w[0].account_id == w[1].account_id {
            return Err(IoError::Schema(format!("duplicate account_id {}", w[0].account_id)));
        }
    }
    Ok(records)
}

// --------------------------- normalized accounts ---------------------------

/// A record together with its normalization (the `accounts_normalized` and
/// `accounts_filtered` schema).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedRow {
    pub record: Record,
    pub norm: NameNorm,
}

const NORMALIZED_HEADER: [&str; 14] = [
    "account_id",
    "account_id_src",
    "account_name",
    "created_utc",
    "relationship",
    "name_base",
    "name_core",
    "suffix_class",
    "has_parentheses",
    "has_semicolon",
    "has_multiple_names",
    "num_style_signature",
    "alias_candidates",
    "alias_sources",
];

pub fn write_normalized(path: &Path, rows: &[NormalizedRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.record.account_id.as_str().to_string(),
                r.record.account_id_src.clone(),
                r.record.account_name.clone(),
                r.record.created_utc.clone().unwrap_or_default(),
                r.record.relationship.clone().unwrap_or_default(),
                r.norm.name_base.clone(),
                r.norm.name_core.clone(),
                r.norm.suffix_class.as_str().to_string(),
                fmt_bool(r.norm.has_parentheses).to_string(),
                fmt_bool(r.norm.has_semicolon).to_string(),
                fmt_bool(r.norm.has_multiple_names).to_string(),
                r.norm.num_style_signature.clone(),
                join_multi(&r.norm.alias_candidates),
                join_multi(
                    &r.norm.alias_sources.iter().map(|s| s.as_str().to_string()).collect::<Vec<_>>(),
                ),
            ]
        })
        .collect();
    write_table(path, &NORMALIZED_HEADER, table)
}

pub fn read_normalized(path: &Path) -> Result<Vec<NormalizedRow>, IoError> {
    let mut out = Vec::new();
    for rec in read_table(path, &NORMALIZED_HEADER)? {
        let sources = split_multi(&rec[13])
            .iter()
            .map(|s| {
                AliasSource::from_str(s)
                    .map_err(|e| IoError::Schema(format!("column alias_sources: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.push(NormalizedRow {
            record: Record {
                account_id: parse_account_id(&rec[0], "account_id")?,
                account_id_src: rec[1].to_string(),
                account_name: rec[2].to_string(),
                created_utc: opt_str(&rec[3]),
                relationship: opt_str(&rec[4]),
            },
            norm: NameNorm {
                name_raw: rec[2].to_string(),
                name_base: rec[5].to_string(),
                name_core: rec[6].to_string(),
                suffix_class: SuffixClass::from_str(&rec[7])
                    .map_err(|e| IoError::Schema(format!("column suffix_class: {e}")))?,
                has_parentheses: parse_bool(&rec[8], "has_parentheses")?,
                has_semicolon: parse_bool(&rec[9], "has_semicolon")?,
                has_multiple_names: parse_bool(&rec[10], "has_multiple_names")?,
                num_style_signature: rec[11].to_string(),
                alias_candidates: split_multi(&rec[12]),
                alias_sources: sources,
            },
        });
    }
    Ok(out)
}

// ----------------------------- filtered-out audit -----------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilteredOutRow {
    pub account_id: AccountId,
    pub account_name: String,
    pub drop_reason: String,
}

const FILTERED_OUT_HEADER: [&str; 3] = ["account_id", "account_name", "drop_reason"];

pub fn write_filtered_out(path: &Path, rows: &[FilteredOutRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![r.account_id.as_str().to_string(), r.account_name.clone(), r.drop_reason.clone()]
        })
        .collect();
    write_table(path, &FILTERED_OUT_HEADER, table)
}

pub fn read_filtered_out(path: &Path) -> Result<Vec<FilteredOutRow>, IoError> {
    read_table(path, &FILTERED_OUT_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(FilteredOutRow {
                account_id: parse_account_id(&rec[0], "account_id")?,
                account_name: rec[1].to_string(),
                drop_reason: rec[2].to_string(),
            })
        })
        .collect()
}

// ------------------------------ exact-raw groups ------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactGroupRow {
    pub key: String,
    pub representative: AccountId,
    pub size: u32,
    pub members: Vec<AccountId>,
}

const EXACT_HEADER: [&str; 4] = ["key", "representative", "size", "members"];

pub fn write_exact_groups(path: &Path, rows: &[ExactGroupRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.key.clone(),
                r.representative.as_str().to_string(),
                r.size.to_string(),
                join_multi(&r.members.iter().map(|m| m.as_str().to_string()).collect::<Vec<_>>()),
            ]
        })
        .collect();
    write_table(path, &EXACT_HEADER, table)
}

pub fn read_exact_groups(path: &Path) -> Result<Vec<ExactGroupRow>, IoError> {
    read_table(path, &EXACT_HEADER)?
        .into_iter()
        .map(|rec| {
            let members = split_multi(&rec[3])
                .iter()
                .map(|m| parse_account_id(m, "members"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ExactGroupRow {
                key: rec[0].to_string(),
                representative: parse_account_id(&rec[1], "representative")?,
                size: parse_u32(&rec[2], "size")?,
                members,
            })
        })
        .collect()
}

// ------------------------------ candidate pairs ------------------------------

const PAIRS_HEADER: [&str; 11] = [
    "id_a",
    "id_b",
    "score",
    "suffix_match",
    "ratio_name",
    "ratio_set",
    "jaccard_bp",
    "block_key",
    "strategy",
    "high_conf",
    "pairs_capped",
];

pub fn write_pairs(path: &Path, pairs: &[CandidatePair]) -> Result<(), IoError> {
    let table = pairs
        .iter()
        .map(|p| {
            vec![
                p.id_a.as_str().to_string(),
                p.id_b.as_str().to_string(),
                centi_to_string(p.score),
                fmt_bool(p.suffix_match).to_string(),
                p.ratio_name.to_string(),
                p.ratio_set.to_string(),
                p.jaccard_bp.to_string(),
                p.block_key.clone(),
                p.strategy.as_str().to_string(),
                fmt_bool(p.high_conf).to_string(),
                fmt_bool(p.pairs_capped).to_string(),
            ]
        })
        .collect();
    write_table(path, &PAIRS_HEADER, table)
}

pub fn read_pairs(path: &Path) -> Result<Vec<CandidatePair>, IoError> {
    read_table(path, &PAIRS_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(CandidatePair {
                id_a: parse_account_id(&rec[0], "id_a")?,
                id_b: parse_account_id(&rec[1], "id_b")?,
                score: parse_score(&rec[2], "score")?,
                suffix_match: parse_bool(&rec[3], "suffix_match")?,
                ratio_name: parse_u32(&rec[4], "ratio_name")?,
                ratio_set: parse_u32(&rec[5], "ratio_set")?,
                jaccard_bp: parse_u32(&rec[6], "jaccard_bp")?,
                block_key: rec[7].to_string(),
                strategy: PairStrategy::from_str(&rec[8])
                    .map_err(|e| IoError::Schema(format!("column strategy: {e}")))?,
                high_conf: parse_bool(&rec[9], "high_conf")?,
                pairs_capped: parse_bool(&rec[10], "pairs_capped")?,
            })
        })
        .collect()
}

// ---------------------------------- groups ----------------------------------

/// Per-record group assignment (the `groups` artifact). Group-level
/// fields repeat on every member row; `suffix_class` is the
/// representative's class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRow {
    pub account_id: AccountId,
    pub group_id: GroupId,
    pub group_size: u32,
    pub representative: AccountId,
    pub max_score: ScoreCenti,
    pub min_score: ScoreCenti,
    pub suffix_class: SuffixClass,
    pub has_suffix_mismatch: bool,
    /// Admission-reason tally, e.g. `edge>=high:3;edge>=medium+shared_token:1`.
    pub reason_summary: String,
}

const GROUPS_HEADER: [&str; 9] = [
    "account_id",
    "group_id",
    "group_size",
    "representative",
    "max_score",
    "min_score",
    "suffix_class",
    "has_suffix_mismatch",
    "reason_summary",
];

pub fn write_groups(path: &Path, rows: &[GroupRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.account_id.as_str().to_string(),
                r.group_id.as_str().to_string(),
                r.group_size.to_string(),
                r.representative.as_str().to_string(),
                centi_to_string(r.max_score),
                centi_to_string(r.min_score),
                r.suffix_class.as_str().to_string(),
                fmt_bool(r.has_suffix_mismatch).to_string(),
                r.reason_summary.clone(),
            ]
        })
        .collect();
    write_table(path, &GROUPS_HEADER, table)
}

pub fn read_groups(path: &Path) -> Result<Vec<GroupRow>, IoError> {
    read_table(path, &GROUPS_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(GroupRow {
                account_id: parse_account_id(&rec[0], "account_id")?,
                group_id: parse_group_id(&rec[1], "group_id")?,
                group_size: parse_u32(&rec[2], "group_size")?,
                representative: parse_account_id(&rec[3], "representative")?,
                max_score: parse_score(&rec[4], "max_score")?,
                min_score: parse_score(&rec[5], "min_score")?,
                suffix_class: SuffixClass::from_str(&rec[6])
                    .map_err(|e| IoError::Schema(format!("column suffix_class: {e}")))?,
                has_suffix_mismatch: parse_bool(&rec[7], "has_suffix_mismatch")?,
                reason_summary: rec[8].to_string(),
            })
        })
        .collect()
}

// ------------------------------- survivorship -------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurvivorshipRow {
    pub account_id: AccountId,
    pub group_id: GroupId,
    pub is_primary: bool,
    pub primary_reason: String,
    pub tie_breaker_applied: String,
    pub weakest_edge_to_primary: Option<ScoreCenti>,
    pub score_to_primary: Option<ScoreCenti>,
    pub merge_preview: String,
}

const SURVIVORSHIP_HEADER: [&str; 8] = [
    "account_id",
    "group_id",
    "is_primary",
    "primary_reason",
    "tie_breaker_applied",
    "weakest_edge_to_primary",
    "score_to_primary",
    "merge_preview",
];

pub fn write_survivorship(path: &Path, rows: &[SurvivorshipRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.account_id.as_str().to_string(),
                r.group_id.as_str().to_string(),
                fmt_bool(r.is_primary).to_string(),
                r.primary_reason.clone(),
                r.tie_breaker_applied.clone(),
                fmt_opt_score(r.weakest_edge_to_primary),
                fmt_opt_score(r.score_to_primary),
                r.merge_preview.clone(),
            ]
        })
        .collect();
    write_table(path, &SURVIVORSHIP_HEADER, table)
}

pub fn read_survivorship(path: &Path) -> Result<Vec<SurvivorshipRow>, IoError> {
    read_table(path, &SURVIVORSHIP_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(SurvivorshipRow {
                account_id: parse_account_id(&rec[0], "account_id")?,
                group_id: parse_group_id(&rec[1], "group_id")?,
                is_primary: parse_bool(&rec[2], "is_primary")?,
                primary_reason: rec[3].to_string(),
                tie_breaker_applied: rec[4].to_string(),
                weakest_edge_to_primary: parse_opt_score(&rec[5], "weakest_edge_to_primary")?,
                score_to_primary: parse_opt_score(&rec[6], "score_to_primary")?,
                merge_preview: rec[7].to_string(),
            })
        })
        .collect()
}

// ------------------------------- dispositions -------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispositionRow {
    pub account_id: AccountId,
    pub disposition: Disposition,
    pub disposition_reason: String,
}

const DISPOSITIONS_HEADER: [&str; 3] = ["account_id", "disposition", "disposition_reason"];

pub fn write_dispositions(path: &Path, rows: &[DispositionRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.account_id.as_str().to_string(),
                r.disposition.as_str().to_string(),
                r.disposition_reason.clone(),
            ]
        })
        .collect();
    write_table(path, &DISPOSITIONS_HEADER, table)
}

pub fn read_dispositions(path: &Path) -> Result<Vec<DispositionRow>, IoError> {
    read_table(path, &DISPOSITIONS_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(DispositionRow {
                account_id: parse_account_id(&rec[0], "account_id")?,
                disposition: Disposition::from_str(&rec[1])
                    .map_err(|e| IoError::Schema(format!("column disposition: {e}")))?,
                disposition_reason: rec[2].to_string(),
            })
        })
        .collect()
}

// ------------------------------- alias matches -------------------------------

const ALIAS_HEADER: [&str; 6] =
    ["record_id", "alias_text", "source", "matched_id", "matched_group_id", "score"];

pub fn write_alias_matches(
    path: &Path,
    rows: &[dedupe_core::entities::AliasMatch],
) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.record_id.as_str().to_string(),
                r.alias_text.clone(),
                r.source.as_str().to_string(),
                r.matched_id.as_str().to_string(),
                r.matched_group_id.as_str().to_string(),
                centi_to_string(r.score),
            ]
        })
        .collect();
    write_table(path, &ALIAS_HEADER, table)
}

pub fn read_alias_matches(
    path: &Path,
) -> Result<Vec<dedupe_core::entities::AliasMatch>, IoError> {
    read_table(path, &ALIAS_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(dedupe_core::entities::AliasMatch {
                record_id: parse_account_id(&rec[0], "record_id")?,
                alias_text: rec[1].to_string(),
                source: AliasSource::from_str(&rec[2])
                    .map_err(|e| IoError::Schema(format!("column source: {e}")))?,
                matched_id: parse_account_id(&rec[3], "matched_id")?,
                matched_group_id: parse_group_id(&rec[4], "matched_group_id")?,
                score: parse_score(&rec[5], "score")?,
            })
        })
        .collect()
}

// -------------------------------- block stats --------------------------------

const BLOCK_STATS_HEADER: [&str; 7] =
    ["strategy", "block_key", "block_size", "pairs_emitted", "pairs_possible", "capped", "shards"];

pub fn write_block_stats(path: &Path, rows: &[BlockStat]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.strategy.as_str().to_string(),
                r.block_key.clone(),
                r.block_size.to_string(),
                r.pairs_emitted.to_string(),
                r.pairs_possible.to_string(),
                fmt_bool(r.capped).to_string(),
                r.shards.to_string(),
            ]
        })
        .collect();
    write_table(path, &BLOCK_STATS_HEADER, table)
}

pub fn read_block_stats(path: &Path) -> Result<Vec<BlockStat>, IoError> {
    read_table(path, &BLOCK_STATS_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(BlockStat {
                strategy: PairStrategy::from_str(&rec[0])
                    .map_err(|e| IoError::Schema(format!("column strategy: {e}")))?,
                block_key: rec[1].to_string(),
                block_size: parse_u32(&rec[2], "block_size")?,
                pairs_emitted: parse_u64(&rec[3], "pairs_emitted")?,
                pairs_possible: parse_u64(&rec[4], "pairs_possible")?,
                capped: parse_bool(&rec[5], "capped")?,
                shards: parse_u32(&rec[6], "shards")?,
            })
        })
        .collect()
}

// -------------------------------- review ready --------------------------------

/// Final review projection (the `review_ready` schema).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewRow {
    pub account_id: AccountId,
    pub account_id_src: String,
    pub account_name: String,
    pub created_utc: Option<String>,
    pub relationship: Option<String>,
    pub group_id: GroupId,
    pub group_size: u32,
    pub is_primary: bool,
    pub weakest_edge_to_primary: Option<ScoreCenti>,
    pub score_to_primary: Option<ScoreCenti>,
    pub disposition: Disposition,
    pub disposition_reason: String,
    pub merge_preview: String,
    pub alias_cross_refs: String,
}

const REVIEW_HEADER: [&str; 14] = [
    "account_id",
    "account_id_src",
    "account_name",
    "created_utc",
    "relationship",
    "group_id",
    "group_size",
    "is_primary",
    "weakest_edge_to_primary",
    "score_to_primary",
    "disposition",
    "disposition_reason",
    "merge_preview",
    "alias_cross_refs",
];

pub fn write_review_ready(path: &Path, rows: &[ReviewRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.account_id.as_str().to_string(),
                r.account_id_src.clone(),
                r.account_name.clone(),
                r.created_utc.clone().unwrap_or_default(),
                r.relationship.clone().unwrap_or_default(),
                r.group_id.as_str().to_string(),
                r.group_size.to_string(),
                fmt_bool(r.is_primary).to_string(),
                fmt_opt_score(r.weakest_edge_to_primary),
                fmt_opt_score(r.score_to_primary),
                r.disposition.as_str().to_string(),
                r.disposition_reason.clone(),
                r.merge_preview.clone(),
                r.alias_cross_refs.clone(),
            ]
        })
        .collect();
    write_table(path, &REVIEW_HEADER, table)
}

pub fn read_review_ready(path: &Path) -> Result<Vec<ReviewRow>, IoError> {
    read_table(path, &REVIEW_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(ReviewRow {
                account_id: parse_account_id(&rec[0], "account_id")?,
                account_id_src: rec[1].to_string(),
                account_name: rec[2].to_string(),
                created_utc: opt_str(&rec[3]),
                relationship: opt_str(&rec[4]),
                group_id: parse_group_id(&rec[5], "group_id")?,
                group_size: parse_u32(&rec[6], "group_size")?,
                is_primary: parse_bool(&rec[7], "is_primary")?,
                weakest_edge_to_primary: parse_opt_score(&rec[8], "weakest_edge_to_primary")?,
                score_to_primary: parse_opt_score(&rec[9], "score_to_primary")?,
                disposition: Disposition::from_str(&rec[10])
                    .map_err(|e| IoError::Schema(format!("column disposition: {e}")))?,
                disposition_reason: rec[11].to_string(),
                merge_preview: rec[12].to_string(),
                alias_cross_refs: rec[13].to_string(),
            })
        })
        .collect()
}

// ------------------------------ group stats/details ------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupStatsRow {
    pub group_id: GroupId,
    pub group_size: u32,
    pub max_score: ScoreCenti,
    pub primary_name: String,
    pub disposition: Disposition,
}

const GROUP_STATS_HEADER: [&str; 5] =
    ["group_id", "group_size", "max_score", "primary_name", "disposition"];

pub fn write_group_stats(path: &Path, rows: &[GroupStatsRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.group_id.as_str().to_string(),
                r.group_size.to_string(),
                centi_to_string(r.max_score),
                r.primary_name.clone(),
                r.disposition.as_str().to_string(),
            ]
        })
        .collect();
    write_table(path, &GROUP_STATS_HEADER, table)
}

pub fn read_group_stats(path: &Path) -> Result<Vec<GroupStatsRow>, IoError> {
    read_table(path, &GROUP_STATS_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(GroupStatsRow {
                group_id: parse_group_id(&rec[0], "group_id")?,
                group_size: parse_u32(&rec[1], "group_size")?,
                max_score: parse_score(&rec[2], "max_score")?,
                primary_name: rec[3].to_string(),
                disposition: Disposition::from_str(&rec[4])
                    .map_err(|e| IoError::Schema(format!("column disposition: {e}")))?,
            })
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDetailsRow {
    pub group_id: GroupId,
    pub account_id: AccountId,
    pub account_name: String,
    pub is_primary: bool,
    pub score_to_primary: Option<ScoreCenti>,
    pub disposition: Disposition,
}

const GROUP_DETAILS_HEADER: [&str; 6] =
    ["group_id", "account_id", "account_name", "is_primary", "score_to_primary", "disposition"];

pub fn write_group_details(path: &Path, rows: &[GroupDetailsRow]) -> Result<(), IoError> {
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.group_id.as_str().to_string(),
                r.account_id.as_str().to_string(),
                r.account_name.clone(),
                fmt_bool(r.is_primary).to_string(),
                fmt_opt_score(r.score_to_primary),
                r.disposition.as_str().to_string(),
            ]
        })
        .collect();
    write_table(path, &GROUP_DETAILS_HEADER, table)
}

pub fn read_group_details(path: &Path) -> Result<Vec<GroupDetailsRow>, IoError> {
    read_table(path, &GROUP_DETAILS_HEADER)?
        .into_iter()
        .map(|rec| {
            Ok(GroupDetailsRow {
                group_id: parse_group_id(&rec[0], "group_id")?,
                account_id: parse_account_id(&rec[1], "account_id")?,
                account_name: rec[2].to_string(),
                is_primary: parse_bool(&rec[3], "is_primary")?,
                score_to_primary: parse_opt_score(&rec[4], "score_to_primary")?,
                disposition: Disposition::from_str(&rec[5])
                    .map_err(|e| IoError::Schema(format!("column disposition: {e}")))?,
            })
        })
        .collect()
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excel_serials_coerce() {
        // 45000 days past 1899-12-30 = 2023-03-15.
        assert_eq!(coerce_created("45000"), Some("2023-03-15T00:00:00Z".to_string()));
        assert_eq!(coerce_created("45000.5"), Some("2023-03-15T12:00:00Z".to_string()));
        assert_eq!(coerce_created("2020-06-01"), Some("2020-06-01T00:00:00Z".to_string()));
        assert_eq!(coerce_created("06/01/2020"), Some("2020-06-01T00:00:00Z".to_string()));
        assert_eq!(
            coerce_created("2020-06-01T08:30:00Z"),
            Some("2020-06-01T08:30:00Z".to_string())
        );
        assert_eq!(coerce_created(""), None);
        assert_eq!(coerce_created("yesterday"), None);
    }

    #[test]
    fn input_rejects_spreadsheet_magic() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("input.csv");
        std::fs::write(&p, b"PK\x03\x04fake-zip").unwrap();
        let err = read_input(&p).unwrap_err();
        assert!(matches!(err, IoError::Schema(_)));
    }

    #[test]
    fn input_requires_account_name() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("input.csv");
        std::fs::write(&p, "company,city\nAcme,Reno\n").unwrap();
        assert!(matches!(read_input(&p).unwrap_err(), IoError::Schema(_)));
    }

    #[test]
    fn resolve_generates_and_sorts() {
        let rows = vec![
            RawInputRow {
                account_id: Some("001zzzzzzzzzzzz".into()),
                account_name: "Zeta".into(),
                created_date: Some("45000".into()),
                relationship: None,
            },
            RawInputRow {
                account_id: None,
                account_name: "NoId Co".into(),
                created_date: None,
                relationship: Some("client".into()),
            },
        ];
        let records = resolve_records(&rows, &"ab".repeat(32)).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.windows(2).all(|w| w[0].account_id < w[1].account_id));
        let gen = records.iter().find(|r| r.account_id_src.is_empty()).unwrap();
        assert_eq!(gen.account_name, "NoId Co");
        let real = records.iter().find(|r| !r.account_id_src.is_empty()).unwrap();
        assert_eq!(real.created_utc.as_deref(), Some("2023-03-15T00:00:00Z"));
    }

    #[test]
    fn resolve_reports_bad_id_samples() {
        let rows = vec![RawInputRow {
            account_id: Some("not-an-id".into()),
            account_name: "Broken".into(),
            created_date: None,
            relationship: None,
        }];
        match resolve_records(&rows, &"ab".repeat(32)).unwrap_err() {
            IoError::IdFormat { count, samples } => {
                assert_eq!(count, 1);
                assert_eq!(samples, vec!["not-an-id".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn pairs_round_trip() {
        use dedupe_core::entities::PairStrategy;
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("pairs.csv");
        let pairs = vec![CandidatePair {
            id_a: AccountId::canonicalize("001aaaaaaaaaa01").unwrap(),
            id_b: AccountId::canonicalize("001aaaaaaaaaa02").unwrap(),
            score: 9_123,
            suffix_match: true,
            ratio_name: 93,
            ratio_set: 95,
            jaccard_bp: 7_500,
            block_key: "acme".into(),
            strategy: PairStrategy::FirstToken,
            high_conf: false,
            pairs_capped: true,
        }];
        write_pairs(&p, &pairs).unwrap();
        assert_eq!(read_pairs(&p).unwrap(), pairs);
    }

    #[test]
    fn header_mismatch_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("groups.csv");
        std::fs::write(&p, "account_id,group\nx,y\n").unwrap();
        assert!(matches!(read_groups(&p).unwrap_err(), IoError::Schema(_)));
    }
}
