//! crates/dedupe_match/src/similarity.rs
//! Composite similarity over normalized name cores.
//!
//! Two-phase: a cheap token-overlap gate (Dice coefficient) rejects most
//! pairs before the Levenshtein-based ratios run. All arithmetic lands in
//! integer centipoints; the float boundary is confined to
//! `normalized_levenshtein` whose result is rounded once per ratio.

use std::collections::BTreeSet;

use dedupe_core::config::ResolvedSimilarity;
use dedupe_core::entities::NameNorm;
use dedupe_core::score::{clamp_centi, ScoreCenti};

/// Ratio components for one pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairScore {
    /// Composite minus penalties, clamped (centipoints).
    pub score: ScoreCenti,
    /// Token-sort ratio, whole points.
    pub ratio_name: u32,
    /// Token-set ratio, whole points.
    pub ratio_set: u32,
    /// Jaccard in basis points.
    pub jaccard_bp: u32,
    pub suffix_match: bool,
}

#[inline]
fn tokens(core: &str) -> Vec<&str> {
    core.split(' ').filter(|t| !t.is_empty()).collect()
}

#[inline]
fn token_set(core: &str) -> BTreeSet<&str> {
    core.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Whole-point ratio (0..=100) from normalized Levenshtein similarity.
fn ratio_100(a: &str, b: &str) -> u32 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    let sim = strsim::normalized_levenshtein(a, b);
    (sim * 100.0).round() as u32
}

/// Ratio over sorted-token joins: word order stops mattering.
pub fn token_sort_ratio(core_a: &str, core_b: &str) -> u32 {
    let mut ta = tokens(core_a);
    let mut tb = tokens(core_b);
    ta.sort_unstable();
    tb.sort_unstable();
    ratio_100(&ta.join(" "), &tb.join(" "))
}

/// Classic token-set ratio: compare the shared-token join against each
/// side's full join and take the best of the three comparisons.
pub fn token_set_ratio(core_a: &str, core_b: &str) -> u32 {
    let sa = token_set(core_a);
    let sb = token_set(core_b);
    if sa.is_empty() && sb.is_empty() {
        return 100;
    }
    if sa.is_empty() || sb.is_empty() {
        return 0;
    }

    let inter: Vec<&str> = sa.intersection(&sb).copied().collect();
    let only_a: Vec<&str> = sa.difference(&sb).copied().collect();
    let only_b: Vec<&str> = sb.difference(&sa).copied().collect();

    let t0 = inter.join(" ");
    let t1 = if only_a.is_empty() { t0.clone() } else if t0.is_empty() { only_a.join(" ") } else { format!("{t0} {}", only_a.join(" ")) };
    let t2 = if only_b.is_empty() { t0.clone() } else if t0.is_empty() { only_b.join(" ") } else { format!("{t0} {}", only_b.join(" ")) };

    ratio_100(&t0, &t1).max(ratio_100(&t0, &t2)).max(ratio_100(&t1, &t2))
}

/// Jaccard (basis points) and the 20-point composite term (centipoints),
/// both rounded from the same intersection/union counts.
fn jaccard_terms(core_a: &str, core_b: &str) -> (u32, u32) {
    let sa = token_set(core_a);
    let sb = token_set(core_b);
    let inter = sa.intersection(&sb).count() as u64;
    let union = sa.union(&sb).count() as u64;
    if union == 0 {
        // Two empty cores are identical by convention.
        return (10_000, 2_000);
    }
    let bp = ((10_000 * inter + union / 2) / union) as u32;
    let term_centi = ((2_000 * inter + union / 2) / union) as u32;
    (bp, term_centi)
}

/// Cheap pre-gate: Dice coefficient over token sets, whole points.
/// No Levenshtein work; safe upper-bound style filter.
pub fn dice_gate(core_a: &str, core_b: &str) -> u32 {
    let sa = token_set(core_a);
    let sb = token_set(core_b);
    let total = (sa.len() + sb.len()) as u64;
    if total == 0 {
        return 100;
    }
    let inter = sa.intersection(&sb).count() as u64;
    ((200 * inter + total / 2) / total) as u32
}

/// Score one candidate pair. Returns `None` when the cheap gate rejects it
/// (the expensive ratios never run). Symmetric in its arguments.
pub fn score_pair(a: &NameNorm, b: &NameNorm, cfg: &ResolvedSimilarity) -> Option<PairScore> {
    if dice_gate(&a.name_core, &b.name_core) < cfg.gate_cutoff {
        return None;
    }

    let ratio_name = token_sort_ratio(&a.name_core, &b.name_core);
    let ratio_set = token_set_ratio(&a.name_core, &b.name_core);
    let (jaccard_bp, jaccard_centi) = jaccard_terms(&a.name_core, &b.name_core);

    // composite = 0.45·ratio_name + 0.35·ratio_set + 20·jaccard, in centi.
    let composite = 45 * ratio_name as i64 + 35 * ratio_set as i64 + jaccard_centi as i64;

    let suffix_match = a.suffix_class == b.suffix_class;
    let mut penalties: i64 = 0;
    if !suffix_match {
        penalties += cfg.penalty_suffix as i64;
    }
    if a.num_style_signature != b.num_style_signature {
        penalties += cfg.penalty_num_style as i64;
    }
    if a.has_parentheses != b.has_parentheses || a.has_semicolon != b.has_semicolon {
        penalties += cfg.penalty_punct as i64;
    }

    Some(PairScore {
        score: clamp_centi(composite - penalties),
        ratio_name,
        ratio_set,
        jaccard_bp,
        suffix_match,
    })
}

/// Keep rule for the scored artifact: pairs at or above `medium`, plus
/// suffix-mismatch pairs that would have cleared `medium` without the
/// suffix penalty (kept as annotations; they can only force Verify).
pub fn keep_scored(score: &PairScore, cfg: &ResolvedSimilarity) -> bool {
    if score.score >= cfg.medium {
        return true;
    }
    !score.suffix_match && score.score + cfg.penalty_suffix >= cfg.medium
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_name;
    use dedupe_core::config::SimilarityCfg;
    use proptest::prelude::*;

    fn cfg() -> ResolvedSimilarity {
        SimilarityCfg::default().resolve().unwrap()
    }

    #[test]
    fn identity_scores_100() {
        let n = normalize_name("Globex Corp");
        let s = score_pair(&n, &n, &cfg()).unwrap();
        assert_eq!(s.score, 10_000);
        assert_eq!(s.ratio_name, 100);
        assert_eq!(s.ratio_set, 100);
        assert_eq!(s.jaccard_bp, 10_000);
        assert!(s.suffix_match);
    }

    #[test]
    fn symmetry() {
        let a = normalize_name("Acme Holdings Inc");
        let b = normalize_name("Acme Holding Incorporated");
        let ab = score_pair(&a, &b, &cfg());
        let ba = score_pair(&b, &a, &cfg());
        assert_eq!(ab, ba);
    }

    #[test]
    fn word_order_insensitive() {
        let a = normalize_name("Jones Smith LLC");
        let b = normalize_name("Smith Jones LLC");
        let s = score_pair(&a, &b, &cfg()).unwrap();
        assert_eq!(s.ratio_name, 100);
        assert_eq!(s.score, 10_000);
    }

    #[test]
    fn suffix_mismatch_penalized_and_annotated() {
        let a = normalize_name("Acme Holdings Inc");
        let b = normalize_name("Acme Holdings LLC");
        let c = cfg();
        let s = score_pair(&a, &b, &c).unwrap();
        assert!(!s.suffix_match);
        // Identical cores: composite 100.00 minus the 25-point penalty.
        assert_eq!(s.score, 7_500);
        assert!(s.score < c.high);
        // Below medium, but kept as an annotation.
        assert!(keep_scored(&s, &c));
    }

    #[test]
    fn num_style_penalty() {
        let c = cfg();
        // Enough shared tokens to clear the gate; signatures "20 20" vs
        // "2020" conflict and cost the numeric-style penalty.
        let a = normalize_name("20 20 Vision Group Partners");
        let b = normalize_name("2020 Vision Group Partners");
        let with_conflict = score_pair(&a, &b, &c).unwrap();
        assert!(with_conflict.score < 10_000);

        let b_same = normalize_name("20-20 Vision Group Partners");
        let without = score_pair(&a, &b_same, &c).unwrap();
        assert_eq!(without.score, 10_000);
        assert!(with_conflict.score < without.score);
    }

    #[test]
    fn gate_rejects_disjoint() {
        let a = normalize_name("Acme Holdings");
        let b = normalize_name("Zenith Partners");
        assert_eq!(score_pair(&a, &b, &cfg()), None);
    }

    #[test]
    fn medium_keep_rule() {
        let c = cfg();
        let lo = PairScore { score: 8_399, ratio_name: 0, ratio_set: 0, jaccard_bp: 0, suffix_match: true };
        let hi = PairScore { score: 8_400, ratio_name: 0, ratio_set: 0, jaccard_bp: 0, suffix_match: true };
        assert!(!keep_scored(&lo, &c));
        assert!(keep_scored(&hi, &c));
    }

    proptest! {
        #[test]
        fn score_bounds_and_symmetry(a in "[a-z0-9 ]{0,40}", b in "[a-z0-9 ]{0,40}") {
            let c = cfg();
            let na = normalize_name(&a);
            let nb = normalize_name(&b);
            let ab = score_pair(&na, &nb, &c);
            let ba = score_pair(&nb, &na, &c);
            prop_assert_eq!(ab, ba);
            if let Some(s) = ab {
                prop_assert!(s.score <= 10_000);
                prop_assert!(s.ratio_name <= 100 && s.ratio_set <= 100);
                prop_assert!(s.jaccard_bp <= 10_000);
            }
        }

        #[test]
        fn identity_is_always_100(a in "[a-z][a-z0-9 ]{0,40}") {
            let na = normalize_name(&a);
            let s = score_pair(&na, &na, &cfg()).unwrap();
            prop_assert_eq!(s.score, 10_000);
        }
    }
}
