//! crates/dedupe_match/src/blocking.rs
//! Multi-strategy candidate blocking with token hygiene, per-block and
//! global pair budgets, a length-window prefilter, and deterministic jumbo
//! sharding.
//!
//! Callers pass records sorted ascending by `account_id`; pair seeds are
//! `(index_a, index_b)` with `index_a < index_b`, which therefore respects
//! the `id_a < id_b` invariant downstream.

use std::collections::{BTreeMap, BTreeSet};

use dedupe_core::config::BlockingCfg;
use dedupe_core::entities::{BlockStat, NameNorm, PairStrategy};
use dedupe_core::sampler::BlockSampler;

/// An unscored candidate produced by blocking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairSeed {
    pub a: u32,
    pub b: u32,
    pub strategy: PairStrategy,
    pub block_key: String,
    /// A cap fired somewhere on the path that produced this pair.
    pub capped: bool,
}

/// Blocking result: unique seeds plus the audit stats.
#[derive(Clone, Debug, Default)]
pub struct BlockingOutcome {
    /// Unique across strategies, sorted by `(a, b)`.
    pub seeds: Vec<PairSeed>,
    pub stats: Vec<BlockStat>,
    /// The global pair budget fired.
    pub total_capped: bool,
}

/// Tokens eligible as blocking keys: long enough and not a stop token.
fn eligible_tokens<'a>(norm: &'a NameNorm, cfg: &BlockingCfg, stops: &BTreeSet<&str>) -> Vec<&'a str> {
    norm.core_tokens()
        .filter(|t| t.chars().count() >= cfg.min_token_len && !stops.contains(*t))
        .collect()
}

/// First `prefix_len` non-space chars of the core.
fn prefix_key(norm: &NameNorm, prefix_len: usize) -> Option<String> {
    let compact: String = norm.name_core.chars().filter(|c| *c != ' ').take(prefix_len).collect();
    if compact.is_empty() {
        None
    } else {
        Some(compact)
    }
}

/// Blocking keys one record contributes under one strategy.
fn keys_for(
    strategy: PairStrategy,
    toks: &[&str],
    norm: &NameNorm,
    cfg: &BlockingCfg,
    dropped_first_tokens: &BTreeSet<String>,
) -> Vec<String> {
    match strategy {
        PairStrategy::FirstToken => match toks.first() {
            Some(t) if !dropped_first_tokens.contains(*t) => vec![(*t).to_string()],
            _ => Vec::new(),
        },
        PairStrategy::FirstTwoTokens => {
            if toks.len() >= 2 {
                vec![format!("{} {}", toks[0], toks[1])]
            } else {
                Vec::new()
            }
        }
        PairStrategy::PrefixNgram => prefix_key(norm, cfg.prefix_len).into_iter().collect(),
        PairStrategy::SortedBigrams => {
            let mut keys: BTreeSet<String> = BTreeSet::new();
            for w in toks.windows(2) {
                let (x, y) = if w[0] <= w[1] { (w[0], w[1]) } else { (w[1], w[0]) };
                keys.insert(format!("{x} {y}"));
            }
            keys.into_iter().collect()
        }
        PairStrategy::ExactRaw => Vec::new(), // handled by the fast path, never here
    }
}

/// Generate candidate seeds for the whole corpus.
pub fn generate_pairs(norms: &[NameNorm], cfg: &BlockingCfg, seed: u64) -> BlockingOutcome {
    let stops: BTreeSet<&str> = cfg.stop_tokens.iter().map(String::as_str).collect();
    let toks: Vec<Vec<&str>> = norms.iter().map(|n| eligible_tokens(n, cfg, &stops)).collect();
    let core_len: Vec<usize> = norms.iter().map(|n| n.name_core.chars().count()).collect();

    // Optional hygiene: drop the K most frequent first tokens from blocking.
    let mut dropped_first: BTreeSet<String> = BTreeSet::new();
    if cfg.drop_top_freq_tokens > 0 {
        let mut freq: BTreeMap<&str, u64> = BTreeMap::new();
        for t in &toks {
            if let Some(&first) = t.first() {
                *freq.entry(first).or_insert(0) += 1;
            }
        }
        let mut by_count: Vec<(&str, u64)> = freq.into_iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        for (tok, _) in by_count.into_iter().take(cfg.drop_top_freq_tokens) {
            dropped_first.insert(tok.to_string());
        }
    }

    // Build blocks per (strategy, key); BTreeMap order keeps everything
    // deterministic.
    let mut blocks: BTreeMap<(PairStrategy, String), Vec<u32>> = BTreeMap::new();
    for (idx, norm) in norms.iter().enumerate() {
        for strategy in &cfg.strategies {
            for key in keys_for(*strategy, &toks[idx], norm, cfg, &dropped_first) {
                blocks.entry((*strategy, key)).or_default().push(idx as u32);
            }
        }
    }

    let mut stats: Vec<BlockStat> = Vec::new();
    let mut raw_seeds: Vec<PairSeed> = Vec::new();

    for ((strategy, key), members) in &blocks {
        if members.len() < 2 {
            continue;
        }

        // Jumbo sharding: third-token initial, then first bigram, then a
        // deterministic member downsample as the last resort.
        let mut leaves: Vec<(String, Vec<u32>, bool)> = Vec::new();
        if members.len() > cfg.max_block_size {
            let mut by_initial: BTreeMap<String, Vec<u32>> = BTreeMap::new();
            for &m in members {
                let initial = toks[m as usize]
                    .get(2)
                    .and_then(|t| t.chars().next())
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "_".to_string());
                by_initial.entry(initial).or_default().push(m);
            }
            for (initial, shard) in by_initial {
                if shard.len() > cfg.max_block_size {
                    let mut by_bigram: BTreeMap<String, Vec<u32>> = BTreeMap::new();
                    for &m in &shard {
                        let bigram = if toks[m as usize].len() >= 2 {
                            format!("{} {}", toks[m as usize][0], toks[m as usize][1])
                        } else {
                            "_".to_string()
                        };
                        by_bigram.entry(bigram).or_default().push(m);
                    }
                    for (bigram, sub) in by_bigram {
                        let leaf_key = format!("{key}#t={initial}#b={bigram}");
                        if sub.len() > cfg.max_block_size {
                            let mut sampler = BlockSampler::for_block(seed, &leaf_key);
                            let picked = sampler.sample_indices(sub.len(), cfg.max_block_size);
                            let kept: Vec<u32> = picked.into_iter().map(|i| sub[i]).collect();
                            leaves.push((leaf_key, kept, true));
                        } else {
                            leaves.push((leaf_key, sub, false));
                        }
                    }
                } else {
                    leaves.push((format!("{key}#t={initial}"), shard, false));
                }
            }
        } else {
            leaves.push((key.clone(), members.clone(), false));
        }

        let shard_count = leaves.len() as u32;
        for (leaf_key, leaf_members, downsampled) in leaves {
            let n = leaf_members.len();
            if n < 2 {
                continue;
            }
            let pairs_possible = (n as u64) * (n as u64 - 1) / 2;

            // Length-window prefilter keeps large blocks from N×N blowup.
            let mut pairs: Vec<(u32, u32)> = Vec::new();
            for i in 0..n {
                for j in (i + 1)..n {
                    let (a, b) = (leaf_members[i], leaf_members[j]);
                    let (la, lb) = (core_len[a as usize], core_len[b as usize]);
                    let max_len = la.max(lb);
                    let diff = la.abs_diff(lb);
                    if max_len == 0 || (diff as f64) <= cfg.length_window_ratio * (max_len as f64) {
                        pairs.push((a.min(b), a.max(b)));
                    }
                }
            }

            let mut capped = downsampled;
            if pairs.len() as u64 > cfg.max_pairs_per_block {
                let mut sampler = BlockSampler::for_block(seed, &leaf_key);
                let picked = sampler.sample_indices(pairs.len(), cfg.max_pairs_per_block as usize);
                pairs = picked.into_iter().map(|i| pairs[i]).collect();
                capped = true;
            }

            stats.push(BlockStat {
                strategy: *strategy,
                block_key: leaf_key.clone(),
                block_size: n as u32,
                pairs_emitted: pairs.len() as u64,
                pairs_possible,
                capped,
                shards: shard_count,
            });
            for (a, b) in pairs {
                raw_seeds.push(PairSeed { a, b, strategy: *strategy, block_key: leaf_key.clone(), capped });
            }
        }
    }

    // Unique across strategies: the lowest-ordinal strategy wins; a capped
    // flag from any duplicate sticks.
    let mut unique: BTreeMap<(u32, u32), PairSeed> = BTreeMap::new();
    for seed_pair in raw_seeds {
        match unique.entry((seed_pair.a, seed_pair.b)) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(seed_pair);
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.capped |= seed_pair.capped;
                if seed_pair.strategy < existing.strategy {
                    existing.strategy = seed_pair.strategy;
                    existing.block_key = seed_pair.block_key;
                }
            }
        }
    }

    let mut seeds: Vec<PairSeed> = unique.into_values().collect();

    // Global pair budget.
    let mut total_capped = false;
    if seeds.len() as u64 > cfg.max_pairs_total {
        let mut sampler = BlockSampler::for_block(seed, "__global__");
        let picked = sampler.sample_indices(seeds.len(), cfg.max_pairs_total as usize);
        seeds = picked.into_iter().map(|i| seeds[i].clone()).collect();
        for s in &mut seeds {
            s.capped = true;
        }
        total_capped = true;
    }

    BlockingOutcome { seeds, stats, total_capped }
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_name;

    fn norms(names: &[&str]) -> Vec<NameNorm> {
        names.iter().map(|n| normalize_name(n)).collect()
    }

    #[test]
    fn shared_first_token_pairs_up() {
        let ns = norms(&["Acme Holdings Inc", "Acme Partners LLC", "Zenith Corp"]);
        let out = generate_pairs(&ns, &BlockingCfg::default(), 0);
        assert!(out.seeds.iter().any(|s| (s.a, s.b) == (0, 1)));
        assert!(!out.seeds.iter().any(|s| s.a == 2 || s.b == 2));
    }

    #[test]
    fn stop_tokens_never_block() {
        // "the" is a stop token; these two share nothing else.
        let ns = norms(&["The Alpha Inc", "The Omega LLC"]);
        let out = generate_pairs(&ns, &BlockingCfg::default(), 0);
        assert!(out.seeds.is_empty());
    }

    #[test]
    fn short_tokens_never_block() {
        // Single-char tokens are under min_token_len.
        let ns = norms(&["A Plumbing", "A Roofing"]);
        let out = generate_pairs(&ns, &BlockingCfg::default(), 0);
        assert!(out.seeds.iter().all(|s| s.block_key != "a"));
    }

    #[test]
    fn pairs_unique_across_strategies() {
        // These collide under first_token, first_two_tokens and prefix_ngram.
        let ns = norms(&["Acme Holdings Inc", "Acme Holdings LLC"]);
        let out = generate_pairs(&ns, &BlockingCfg::default(), 0);
        assert_eq!(out.seeds.len(), 1);
        assert_eq!(out.seeds[0].strategy, PairStrategy::FirstToken);
    }

    #[test]
    fn per_block_cap_enforced() {
        let names: Vec<String> = (0..40).map(|i| format!("Acme Division {i:02}")).collect();
        let ns: Vec<NameNorm> = names.iter().map(|n| normalize_name(n)).collect();
        let mut cfg = BlockingCfg::default();
        cfg.max_pairs_per_block = 100;
        let out = generate_pairs(&ns, &cfg, 0);
        for st in &out.stats {
            assert!(st.pairs_emitted <= 100, "block {} emitted {}", st.block_key, st.pairs_emitted);
        }
        assert!(out.stats.iter().any(|s| s.capped));
        assert!(out.seeds.iter().any(|s| s.capped));
    }

    #[test]
    fn global_budget_enforced() {
        let names: Vec<String> = (0..40).map(|i| format!("Acme Division {i:02}")).collect();
        let ns: Vec<NameNorm> = names.iter().map(|n| normalize_name(n)).collect();
        let mut cfg = BlockingCfg::default();
        cfg.max_pairs_total = 50;
        let out = generate_pairs(&ns, &cfg, 0);
        assert!(out.seeds.len() as u64 <= 50);
        assert!(out.total_capped);
    }

    #[test]
    fn deterministic_across_calls() {
        let names: Vec<String> = (0..60).map(|i| format!("Acme Division {i:02}")).collect();
        let ns: Vec<NameNorm> = names.iter().map(|n| normalize_name(n)).collect();
        let mut cfg = BlockingCfg::default();
        cfg.max_pairs_per_block = 64;
        let a = generate_pairs(&ns, &cfg, 7);
        let b = generate_pairs(&ns, &cfg, 7);
        assert_eq!(a.seeds, b.seeds);
    }

    #[test]
    fn length_window_filters_far_lengths() {
        let mut cfg = BlockingCfg::default();
        cfg.length_window_ratio = 0.2;
        let ns = norms(&["Acme", "Acme Consolidated Industrial Holdings Of America"]);
        let out = generate_pairs(&ns, &cfg, 0);
        assert!(out.seeds.is_empty());
    }
}
