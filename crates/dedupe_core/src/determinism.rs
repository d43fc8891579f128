//! crates/dedupe_core/src/determinism.rs
//! Stable ordering helpers. This module is **I/O-free**.
//!
//! Deterministic output is a hard contract of the engine: identical input
//! and config must produce byte-identical artifacts regardless of worker
//! count. The helpers here supply the canonical sort keys applied after
//! every parallel merge.

use core::cmp::Ordering;

use crate::entities::CandidatePair;
use crate::ids::AccountId;

/// Types participating in stable selections expose a total order key.
pub trait StableOrd {
    type Key: Ord;
    fn stable_key(&self) -> Self::Key;
}

impl StableOrd for AccountId {
    type Key = String;
    #[inline]
    fn stable_key(&self) -> String {
        self.as_str().to_string()
    }
}

/// Order two IDs so that the lexicographically smaller is first
/// (the `id_a < id_b` pair invariant).
#[inline]
pub fn order_pair(x: AccountId, y: AccountId) -> (AccountId, AccountId) {
    if x.as_str() <= y.as_str() {
        (x, y)
    } else {
        (y, x)
    }
}

/// Canonical candidate order for the persisted artifact:
/// `(id_a, id_b, strategy)`.
#[inline]
pub fn cmp_pairs_canonical(a: &CandidatePair, b: &CandidatePair) -> Ordering {
    (a.id_a.as_str(), a.id_b.as_str(), a.strategy)
        .cmp(&(b.id_a.as_str(), b.id_b.as_str(), b.strategy))
}

/// Scoring-output order: `(id_a, id_b, score desc, strategy)`.
#[inline]
pub fn cmp_pairs_scored(a: &CandidatePair, b: &CandidatePair) -> Ordering {
    (a.id_a.as_str(), a.id_b.as_str())
        .cmp(&(b.id_a.as_str(), b.id_b.as_str()))
        .then(b.score.cmp(&a.score))
        .then(a.strategy.cmp(&b.strategy))
}

/// Edge-admission order for grouping: strongest first, ties by ids so a
/// replay admits the same edges in the same order.
#[inline]
pub fn cmp_edges_for_union(a: &CandidatePair, b: &CandidatePair) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.id_a.as_str().cmp(b.id_a.as_str()))
        .then_with(|| a.id_b.as_str().cmp(b.id_b.as_str()))
}

/// Sort members ascending; the group-ID digest depends on this order.
#[inline]
pub fn sort_members(ids: &mut [AccountId]) {
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PairStrategy;
    use crate::score::ScoreCenti;

    fn pair(a: &str, b: &str, score: ScoreCenti, strategy: PairStrategy) -> CandidatePair {
        CandidatePair {
            id_a: AccountId::canonicalize(a).unwrap(),
            id_b: AccountId::canonicalize(b).unwrap(),
            score,
            suffix_match: true,
            ratio_name: 0,
            ratio_set: 0,
            jaccard_bp: 0,
            block_key: String::new(),
            strategy,
            high_conf: false,
            pairs_capped: false,
        }
    }

    const A: &str = "001aaaaaaaaaaaa";
    const B: &str = "001bbbbbbbbbbbb";
    const C: &str = "001cccccccccccc";

    #[test]
    fn pair_invariant_ordering() {
        let x = AccountId::canonicalize(B).unwrap();
        let y = AccountId::canonicalize(A).unwrap();
        let (lo, hi) = order_pair(x, y);
        assert!(lo.as_str() < hi.as_str());
    }

    #[test]
    fn scored_sort_puts_higher_first_within_same_ids() {
        let mut v = vec![
            pair(A, B, 8_400, PairStrategy::FirstToken),
            pair(A, B, 9_900, PairStrategy::PrefixNgram),
            pair(A, C, 9_000, PairStrategy::FirstToken),
        ];
        v.sort_by(cmp_pairs_scored);
        assert_eq!(v[0].score, 9_900);
        assert_eq!(v[1].score, 8_400);
        assert_eq!(v[2].id_b.as_str()[..15], C[..15]);
    }

    #[test]
    fn union_order_is_strength_first() {
        let mut v = vec![
            pair(A, B, 8_400, PairStrategy::FirstToken),
            pair(A, C, 9_900, PairStrategy::FirstToken),
        ];
        v.sort_by(cmp_edges_for_union);
        assert_eq!(v[0].score, 9_900);
    }
}
