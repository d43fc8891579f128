//! crates/dedupe_match/src/exact.rs
//! Exact-equals fast path: rows whose trimmed, whitespace-collapsed raw
//! names are byte-equal pre-merge before any similarity work. Emitting a
//! spanning tree (representative → member) bounds per-group pair cost at
//! O(n) instead of O(n²).

use std::collections::BTreeMap;

use dedupe_core::entities::{CandidatePair, PairStrategy};
use dedupe_core::ids::AccountId;
use dedupe_core::score::SCORE_MAX;

/// One set of byte-equal raw names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactGroup {
    /// The shared (trimmed, collapsed) raw name.
    pub key: String,
    /// Members sorted ascending; `members[0]` is the representative.
    pub members: Vec<AccountId>,
}

impl ExactGroup {
    pub fn representative(&self) -> &AccountId {
        &self.members[0]
    }
}

/// Collapse interior whitespace runs and trim. Case is preserved: the
/// fast path is strictly byte-equality on the cleaned raw name.
fn exact_key(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Group byte-equal names and emit the spanning-tree pairs
/// (`score = 100.00`, `suffix_match = true`, `strategy = exact_raw`).
///
/// Exactly `n − 1` pairs per group of size `n`; the representative is the
/// minimum `account_id`, stable because IDs are generated before this
/// pass.
pub fn exact_equal_groups(rows: &[(AccountId, String)]) -> (Vec<ExactGroup>, Vec<CandidatePair>) {
    let mut buckets: BTreeMap<String, Vec<AccountId>> = BTreeMap::new();
    for (id, raw) in rows {
        let key = exact_key(raw);
        if key.is_empty() {
            continue;
        }
        buckets.entry(key).or_default().push(id.clone());
    }

    let mut groups = Vec::new();
    let mut pairs = Vec::new();
    for (key, mut members) in buckets {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let rep = members[0].clone();
        for member in &members[1..] {
            // rep < member holds by the sort above.
            pairs.push(CandidatePair {
                id_a: rep.clone(),
                id_b: member.clone(),
                score: SCORE_MAX,
                suffix_match: true,
                ratio_name: 100,
                ratio_set: 100,
                jaccard_bp: 10_000,
                block_key: "exact_raw".to_string(),
                strategy: PairStrategy::ExactRaw,
                high_conf: true,
                pairs_capped: false,
            });
        }
        groups.push(ExactGroup { key, members });
    }
    (groups, pairs)
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> AccountId {
        AccountId::canonicalize(&format!("001aaaaaaaaaa{n:02}")).unwrap()
    }

    #[test]
    fn spanning_tree_pair_count() {
        let rows: Vec<(AccountId, String)> =
            (1..=5).map(|n| (id(n), "Globex Corp".to_string())).collect();
        let (groups, pairs) = exact_equal_groups(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 5);
        assert_eq!(pairs.len(), 4, "N rows must yield N-1 spanning edges");
        let rep = groups[0].representative();
        assert!(pairs.iter().all(|p| &p.id_a == rep));
        assert!(pairs.iter().all(|p| p.score == SCORE_MAX && p.suffix_match));
        assert!(pairs.iter().all(|p| p.strategy == PairStrategy::ExactRaw));
    }

    #[test]
    fn whitespace_collapsed_case_preserved() {
        let rows = vec![
            (id(1), "Globex   Corp ".to_string()),
            (id(2), " Globex Corp".to_string()),
            (id(3), "globex corp".to_string()),
        ];
        let (groups, pairs) = exact_equal_groups(&rows);
        // Case differs: the lowercase row stays out of the exact group.
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn representative_is_min_id() {
        let rows = vec![
            (id(9), "Acme".to_string()),
            (id(2), "Acme".to_string()),
            (id(5), "Acme".to_string()),
        ];
        let (groups, _) = exact_equal_groups(&rows);
        assert_eq!(groups[0].representative(), &id(2));
    }

    #[test]
    fn uniques_emit_nothing() {
        let rows = vec![(id(1), "Acme".to_string()), (id(2), "Apex".to_string())];
        let (groups, pairs) = exact_equal_groups(&rows);
        assert!(groups.is_empty());
        assert!(pairs.is_empty());
    }
}
