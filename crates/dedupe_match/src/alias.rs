//! crates/dedupe_match/src/alias.rs
//! Alias cross-matching: alias candidates extracted during normalization
//! are scored against other records' name cores with the same similarity
//! function. A match needs `suffix_match` and a high-confidence score, and
//! is recorded as a cross-link only; group membership never changes here.
//!
//! The posting-list index is built once and shared read-only, so callers
//! can fan the per-record matching out across chunks.

use std::collections::{BTreeMap, BTreeSet};

use dedupe_core::config::ResolvedSimilarity;
use dedupe_core::entities::{AliasMatch, NameNorm};
use dedupe_core::ids::{AccountId, GroupId};

use crate::normalize::normalize_name;
use crate::similarity::score_pair;

/// Shared-token posting lists over eligible core tokens (same hygiene as
/// blocking). Immutable once built.
pub struct AliasIndex<'a> {
    postings: BTreeMap<&'a str, Vec<u32>>,
    stops: BTreeSet<&'a str>,
    min_token_len: usize,
}

impl<'a> AliasIndex<'a> {
    pub fn build(norms: &'a [NameNorm], min_token_len: usize, stop_tokens: &'a [String]) -> Self {
        let stops: BTreeSet<&str> = stop_tokens.iter().map(String::as_str).collect();
        let mut postings: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for (idx, norm) in norms.iter().enumerate() {
            for tok in norm.core_tokens() {
                if tok.chars().count() >= min_token_len && !stops.contains(tok) {
                    postings.entry(tok).or_default().push(idx as u32);
                }
            }
        }
        AliasIndex { postings, stops, min_token_len }
    }
}

/// Match one record's alias candidates against the corpus. Targets come
/// from the posting lists; self and same-group records never link.
pub fn match_record(
    idx: u32,
    ids: &[AccountId],
    norms: &[NameNorm],
    group_of: &[u32],
    group_ids: &[GroupId],
    sim: &ResolvedSimilarity,
    index: &AliasIndex<'_>,
) -> Vec<AliasMatch> {
    let norm = &norms[idx as usize];
    let mut matches = Vec::new();

    for (alias_ord, alias_text) in norm.alias_candidates.iter().enumerate() {
        let alias_norm = normalize_name(alias_text);
        if alias_norm.name_core.is_empty() {
            continue;
        }

        let mut targets: BTreeSet<u32> = BTreeSet::new();
        for tok in alias_norm.core_tokens() {
            if tok.chars().count() >= index.min_token_len && !index.stops.contains(tok) {
                if let Some(list) = index.postings.get(tok) {
                    targets.extend(list.iter().copied());
                }
            }
        }

        for target in targets {
            if target == idx || group_of[target as usize] == group_of[idx as usize] {
                continue;
            }
            let Some(scored) = score_pair(&alias_norm, &norms[target as usize], sim) else {
                continue;
            };
            if !scored.suffix_match || scored.score < sim.high {
                continue;
            }
            matches.push(AliasMatch {
                record_id: ids[idx as usize].clone(),
                alias_text: alias_text.clone(),
                source: norm.alias_sources[alias_ord],
                matched_id: ids[target as usize].clone(),
                matched_group_id: group_ids[group_of[target as usize] as usize].clone(),
                score: scored.score,
            });
        }
    }
    matches
}

/// Match every record's alias candidates (single-threaded convenience;
/// the pipeline chunks `match_record` instead).
pub fn match_aliases(
    ids: &[AccountId],
    norms: &[NameNorm],
    group_of: &[u32],
    group_ids: &[GroupId],
    sim: &ResolvedSimilarity,
    min_token_len: usize,
    stop_tokens: &[String],
) -> Vec<AliasMatch> {
    let index = AliasIndex::build(norms, min_token_len, stop_tokens);
    let mut matches: Vec<AliasMatch> = (0..norms.len() as u32)
        .flat_map(|i| match_record(i, ids, norms, group_of, group_ids, sim, &index))
        .collect();
    sort_matches(&mut matches);
    matches
}

/// Canonical artifact order for alias matches.
pub fn sort_matches(matches: &mut [AliasMatch]) {
    matches.sort_by(|x, y| {
        (x.record_id.as_str(), x.alias_text.as_str(), x.matched_id.as_str())
            .cmp(&(y.record_id.as_str(), y.alias_text.as_str(), y.matched_id.as_str()))
    });
}

/// Distinct matched groups per record, with the sources that produced
/// them. Feeds the disposition reason string.
pub fn alias_rollup(
    matches: &[AliasMatch],
) -> BTreeMap<AccountId, (BTreeSet<GroupId>, Vec<dedupe_core::entities::AliasSource>)> {
    let mut rollup: BTreeMap<AccountId, (BTreeSet<GroupId>, Vec<_>)> = BTreeMap::new();
    for m in matches {
        let entry = rollup.entry(m.record_id.clone()).or_default();
        entry.0.insert(m.matched_group_id.clone());
        if !entry.1.contains(&m.source) {
            entry.1.push(m.source);
        }
    }
    rollup
}

// === Tests ===
